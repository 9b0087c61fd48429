#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("rib_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use rib_engine::geom::{IndexLayout, MAX_RESOLUTION};
    use rib_engine::interp::{SceneCollector, Session, SessionOptions};
    use rib_engine::parse::{Encoding, RibDecoder, RibWriter, StreamItem};
    use rib_engine::scene::{ErrorCollect, ErrorKind};
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    const USAGE: &str = r#"rib_cli (rib-engine)

USAGE:
  rib_cli stats <file> [options]
  rib_cli convert <in> <out> (--ascii | --binary) [--overwrite]

OPTIONS (stats):
  --tess <u> <v>      Default tessellation resolution (default 16 16)
  --strips            Emit triangle strips instead of triangles
  --search <dir>      Directory searched by ReadArchive
  --errors            Print every reported error
  -h, --help          Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "stats" => cmd_stats(&mut args),
            "convert" => cmd_convert(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn cmd_stats(args: &mut Args) -> Result<(), String> {
        let path = PathBuf::from(args.next().ok_or("missing input file")?);
        let mut options = SessionOptions::default();
        let mut print_errors = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--tess" => {
                    let u = parse_resolution(&args.value("--tess")?)?;
                    let v = parse_resolution(&args.value("--tess")?)?;
                    options.tessellation = (u, v);
                }
                "--strips" => options.index_layout = IndexLayout::Strips,
                "--search" => options.archive_search_path = Some(PathBuf::from(args.value("--search")?)),
                "--errors" => print_errors = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`")),
            }
        }

        let mut session = Session::with_handler(SceneCollector::new(), ErrorCollect::new(), options);
        session.read_file(&path).map_err(|err| err.describe())?;
        let (scene, errors) = session.finish();

        println!("file:        {}", path.display());
        println!("requests:    {}", scene.request_count());
        println!("surfaces:    {}", scene.surfaces.len());
        println!("triangles:   {}", scene.triangle_count());
        println!("unsupported: {}", scene.unsupported.len());
        println!("comments:    {}", scene.comments.len());
        println!(
            "errors:      {} (worst: {})",
            errors.errors.len(),
            errors.worst().map_or_else(|| "none".to_owned(), |s| s.to_string())
        );

        if !scene.requests.is_empty() {
            println!();
            for (kind, count) in &scene.requests {
                println!("  {:<24} {count}", kind.name());
            }
        }

        if print_errors {
            println!();
            for error in &errors.errors {
                println!("  {}", error.describe());
            }
        } else if errors.count(ErrorKind::Syntax) > 0 {
            println!("\n(use --errors to list the reported errors)");
        }
        Ok(())
    }

    fn cmd_convert(args: &mut Args) -> Result<(), String> {
        let input = PathBuf::from(args.next().ok_or("missing input file")?);
        let output = PathBuf::from(args.next().ok_or("missing output file")?);
        let mut encoding = None;
        let mut overwrite = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--ascii" => encoding = Some(Encoding::Ascii),
                "--binary" => encoding = Some(Encoding::Binary),
                "--overwrite" => overwrite = true,
                other => return Err(format!("unknown option `{other}`")),
            }
        }
        let encoding = encoding.ok_or("choose an encoding with --ascii or --binary")?;

        ensure_writable(&output, overwrite)?;
        let source = File::open(&input).map_err(|e| format!("open {}: {e}", input.display()))?;
        let target = File::create(&output).map_err(|e| format!("create {}: {e}", output.display()))?;
        let mut writer = RibWriter::new(BufWriter::new(target), encoding);

        let (mut requests, mut reported) = (0usize, 0usize);
        for item in RibDecoder::new(source) {
            match item {
                Ok(StreamItem::Request(request)) => {
                    writer.write_request(&request).map_err(|e| format!("write: {e}"))?;
                    requests += 1;
                }
                Ok(StreamItem::Comment(comment)) => {
                    writer.write_comment(&comment).map_err(|e| format!("write: {e}"))?;
                }
                Err(err) => {
                    eprintln!("{}: {}", input.display(), err.describe());
                    reported += 1;
                }
            }
        }
        writer.flush().map_err(|e| format!("write: {e}"))?;
        writer
            .into_inner()
            .flush()
            .map_err(|e| format!("write: {e}"))?;

        println!(
            "wrote {requests} requests to {} ({reported} errors skipped)",
            output.display()
        );
        Ok(())
    }

    fn ensure_writable(path: &Path, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        Ok(())
    }

    fn parse_resolution(value: &str) -> Result<usize, String> {
        match value.parse::<usize>() {
            Ok(n) if (1..=MAX_RESOLUTION).contains(&n) => Ok(n),
            _ => Err(format!("invalid tessellation resolution `{value}`")),
        }
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
