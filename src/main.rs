use bgcode::{from_ascii_to_binary, from_binary_to_ascii, BinarizerConfig};
use clap::Parser;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::PathBuf,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// A .gcode file to binarize or a .bgcode file to convert back.
    path: PathBuf,
    /// Skip checksum verification when converting back to ascii.
    #[arg(long)]
    no_verify: bool,
}

pub fn main() {
    env_logger::init();
    let args = Args::parse();

    if !args.path.is_file() {
        eprintln!("File Not Found");
        return;
    }

    let Some(ext) = args.path.extension().and_then(|e| e.to_str()) else {
        eprintln!("File type not supported. Expecting .gcode or .bgcode.");
        return;
    };

    match ext {
        "gcode" => {
            println!("ASCII gcode -> Binary gcode");
            let Ok(src) = File::open(&args.path) else {
                eprintln!("Error opening file.");
                return;
            };
            let out_path = args.path.with_extension("bgcode");
            let Ok(dst) = File::create(&out_path) else {
                eprintln!("Error creating file.");
                return;
            };
            let mut reader = BufReader::new(src);
            let mut writer = BufWriter::new(dst);
            if let Err(e) =
                from_ascii_to_binary(&mut reader, &mut writer, BinarizerConfig::conversion())
            {
                eprintln!("Conversion failed: {e}");
                return;
            }
            report_sizes(&args.path, &out_path);
            println!("Conversion Complete");
        }
        "bgcode" => {
            println!("Binary gcode -> ASCII gcode");
            let Ok(src) = File::open(&args.path) else {
                eprintln!("Error opening file.");
                return;
            };
            let out_path = args.path.with_extension("gcode");
            let Ok(dst) = File::create(&out_path) else {
                eprintln!("Error creating file.");
                return;
            };
            let mut reader = BufReader::new(src);
            let mut writer = BufWriter::new(dst);
            if let Err(e) = from_binary_to_ascii(&mut reader, &mut writer, !args.no_verify) {
                eprintln!("Conversion failed: {e}");
                return;
            }
            report_sizes(&args.path, &out_path);
            println!("Conversion Complete");
        }
        _ => {
            eprintln!("File type not supported. Expecting .gcode or .bgcode.");
        }
    }
}

fn report_sizes(src: &PathBuf, dst: &PathBuf) {
    let (Ok(src_meta), Ok(dst_meta)) = (src.metadata(), dst.metadata()) else {
        return;
    };
    let ratio = (dst_meta.len() as f64 / src_meta.len() as f64) * 100.0;
    println!(
        "{} bytes -> {} bytes ({:.2}%)",
        src_meta.len(),
        dst_meta.len(),
        ratio
    );
}
