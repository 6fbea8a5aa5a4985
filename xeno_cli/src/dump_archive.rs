use clap::Parser;

use xeno_import::{bc::ChunkSet, sar::Archive};

#[derive(Parser)]
pub struct DumpArchive {
    path: String,
    /// List the class records of every entry that is a chunk file
    #[clap(short, long)]
    records: bool,
    /// Only list entries with this extension
    #[clap(short, long)]
    extension: Option<String>,
}

pub fn dump_archive(opts: &DumpArchive) -> Result<(), xeno_import::sar::Error> {
    let archive = Archive::read(&opts.path)?;

    eprintln!("{} ({} entries)", archive.path(), archive.len());

    for (index, entry) in archive.entries().enumerate() {
        if let Some(extension) = &opts.extension {
            let matches = entry
                .name()
                .rsplit_once('.')
                .map_or(false, |(_, ext)| ext.eq_ignore_ascii_case(extension));
            if !matches {
                continue;
            }
        }

        println!(
            "{:>4} {:08x} {:>10} {}",
            index,
            entry.hash(),
            entry.size(),
            entry.name()
        );

        if !opts.records {
            continue;
        }

        match archive.file(index).map(ChunkSet::link) {
            Some(Ok(chunks)) => {
                for record in chunks.records() {
                    println!(
                        "       {} v{} {} bytes",
                        record.kind_str(),
                        record.version(),
                        record.size()
                    );
                }
            }
            Some(Err(err)) => eprintln!("       not a chunk file: {}", err),
            None => {}
        }
    }

    Ok(())
}
