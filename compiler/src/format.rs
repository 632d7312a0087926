use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use crate::assembler::GeneratedFile;
use crate::error::{FormatterError, GenError};

/// Post-processing applied to every generated file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Formatter {
    /// Files are emitted exactly as assembled.
    #[default]
    Disabled,
    /// A filter reading the file on stdin and writing the formatted file on
    /// stdout, e.g. `rustfmt --emit stdout`.
    External { program: PathBuf, args: Vec<String> },
}

impl Formatter {
    pub fn external(program: impl Into<PathBuf>) -> Formatter {
        Formatter::External { program: program.into(), args: Vec::new() }
    }

    pub fn with_args<I, S>(self, extra: I) -> Formatter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            Formatter::Disabled => Formatter::Disabled,
            Formatter::External { program, mut args } => {
                args.extend(extra.into_iter().map(Into::into));
                Formatter::External { program, args }
            }
        }
    }

    /// Replaces the contents of `file` with the formatter's output. Any
    /// failure of the tool fails the whole file.
    pub fn apply(&self, file: GeneratedFile) -> Result<GeneratedFile, GenError> {
        match self {
            Formatter::Disabled => Ok(file),
            Formatter::External { program, args } => {
                debug!(program = %program.display(), file = %file.name, "Formatting");
                let contents = run_filter(program, args, &file.name, file.contents.clone())?;
                Ok(GeneratedFile { contents, ..file })
            }
        }
    }
}

fn run_filter(program: &PathBuf, args: &[String], file: &str, input: Vec<u8>) -> Result<Vec<u8>, FormatterError> {
    let spawn_error = |source: std::io::Error| FormatterError::Spawn {
        path: program.clone(),
        file: file.to_string(),
        source,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    // Feed stdin from another thread so a tool that writes before it has read
    // everything cannot deadlock against us.
    let writer = child.stdin.take().map(|mut stdin| thread::spawn(move || stdin.write_all(&input)));

    let output = child.wait_with_output().map_err(spawn_error)?;
    if let Some(writer) = writer {
        match writer.join() {
            Ok(Ok(())) => {}
            // The tool may exit without reading its input; its status decides.
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(err)) => return Err(spawn_error(err)),
            Err(_) => return Err(spawn_error(std::io::Error::other("stdin writer panicked"))),
        }
    }

    if !output.status.success() {
        return Err(FormatterError::Exit {
            path:   program.clone(),
            file:   file.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}
