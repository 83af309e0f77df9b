//! `urbanroute ask`: Route a single request.

use urbanroute_config::AppConfig;
use urbanroute_dispatcher::Dispatcher;

pub async fn run(config: &AppConfig, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut dispatcher = Dispatcher::from_config(config)?;
    let answer = dispatcher.route(text.trim()).await;
    println!("{answer}");
    Ok(())
}
