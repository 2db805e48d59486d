use anyhow::{Context as _, Result};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use tokio::sync::mpsc;

const LINE_BUFFER: usize = 16;

/// Line-oriented stdin that gives up on Ctrl-C instead of blocking.
///
/// Lines are read on a plain thread and forwarded over a channel, so an
/// abandoned read never holds up runtime shutdown.
pub struct Console {
    lines: Option<mpsc::Receiver<io::Result<String>>>,
}

fn spawn_stdin_reader() -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

impl Console {
    pub fn new() -> Self {
        Self { lines: None }
    }

    /// `None` on end of input or Ctrl-C.
    pub async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush().context("Failed to flush stdout")?;

        let lines = self.lines.get_or_insert_with(spawn_stdin_reader);
        tokio::select! {
            line = lines.recv() => {
                line.transpose().context("Failed to read stdin")
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                Ok(None)
            }
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

pub fn success(message: &str) {
    println!("{}", message.green());
}

pub fn failure(message: &str) {
    println!("{}", message.red());
}
