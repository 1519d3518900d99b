//! List the entries of a ZIP or JAR archive
//!
//! Pass an archive path, and optionally an entry name to read:
//! `cargo run --example list_entries -- app.jar META-INF/MANIFEST.MF`

use jar_storage::global;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: list_entries <archive> [entry]");
        std::process::exit(2);
    };

    let archive = global().open(&path, 0)?;
    println!(
        "{}: {} entries, {} bytes",
        archive.path().display(),
        archive.entry_count(),
        archive.size()
    );

    for entry in archive.entries() {
        let entry = entry?;
        let (year, month, day) = entry.mod_date();
        let (hour, minute, second) = entry.mod_time();
        let method = if entry.is_compressed() { "defl" } else { "stor" };
        println!(
            "{:>10} {method}  {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}  {}",
            entry.size(),
            entry.name()
        );
    }

    if let Some(name) = args.next() {
        match archive.find(name.as_bytes())? {
            Some(entry) => {
                let data = archive.read_entry(entry)?;
                println!("\n{name}: {} bytes read", data.len());
                println!("{}", String::from_utf8_lossy(&data));
            }
            None => println!("\n{name}: not found"),
        }
    }

    Ok(())
}
