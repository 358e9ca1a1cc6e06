//! Inspect an NZB and rewrite its metadata
//!
//! Run with: cargo run --example edit -- path/to/file.nzb [output.nzb]

use nzb_rs::{MetaEditor, Nzb};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .ok_or("usage: edit <input.nzb> [output.nzb]")?;
    let output = args.next().unwrap_or_else(|| format!("{input}.edited.nzb"));

    let nzb = Nzb::from_file(&input)?;
    println!("{} files, {} bytes", nzb.files().len(), nzb.size());
    println!("Primary file: {} ({} bytes)", nzb.file().name(), nzb.file().size());
    println!(
        "PAR2: {} bytes ({:.1}%)",
        nzb.par2_size(),
        nzb.par2_percentage()
    );
    for file in nzb.files() {
        let missing = file.missing_segments();
        if !missing.is_empty() {
            println!("  {} is missing segments {:?}", file.name(), missing);
        }
    }
    println!("{}", nzb.to_json(true)?);

    // Tag the release and make sure it carries a title
    let mut editor = MetaEditor::from_file(&input)?;
    if nzb.meta().title.is_none() {
        editor.set_title(nzb.file().stem())?;
    }
    editor.append_tags(["edited"])?;

    let written = editor.to_file(&output, false)?;
    println!("Wrote {}", written.display());

    Ok(())
}
