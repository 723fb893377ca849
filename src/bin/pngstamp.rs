use std::path::Path;

use log::info;

fn main() {
  env_logger::init();

  let args: Vec<String> = std::env::args().skip(1).collect();
  if args.is_empty() {
    eprintln!("Number of arguments must be one or more");
    eprintln!("usage: pngstamp <zip-file>...");
    std::process::exit(1);
  }

  for arg in &args {
    match pngstamp::archive::stamp_zip_file(Path::new(arg)) {
      Ok(report) => {
        for (n, name) in report.failures.iter().enumerate() {
          println!("Error image [{}]: {name}", n + 1);
        }
      }
      Err(e) => {
        eprintln!("{arg}: {e}");
      }
    }
  }

  info!("all work done");
}
