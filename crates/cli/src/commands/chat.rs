//! `urbanroute chat`: Interactive mode.
//!
//! Reads one request per line from stdin. `reset` starts a new session
//! (fresh cache and responder history); `exit`, `quit` or `stop` ends the
//! loop, as does EOF.

use std::io::Write;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use urbanroute_config::AppConfig;
use urbanroute_dispatcher::SessionFactory;

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Reset,
    Exit,
    Request(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        match line.to_lowercase().as_str() {
            "reset" => Input::Reset,
            "exit" | "quit" | "stop" => Input::Exit,
            _ => Input::Request(line),
        }
    }
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let factory = SessionFactory::load(config.clone())?;
    let mut session = factory.new_session()?;

    println!();
    println!("  urbanroute: interactive mode");
    println!();
    println!("  Checkpoint: {}", config.checkpoint.display());
    println!("  Encoder:    {}", factory.model().encoder().kind());
    println!("  Responders: {:?}", session.registered_labels());
    println!();
    println!("  Type your request and press Enter.");
    println!("  Type 'reset' for a new session, 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Empty => {}
            Input::Exit => break,
            Input::Reset => {
                session = factory.new_session()?;
                println!("  Session reset.");
                println!();
            }
            Input::Request(text) => {
                let answer = session.route(text).await;
                println!();
                for line in answer.lines() {
                    println!("  {line}");
                }
                println!();
            }
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
