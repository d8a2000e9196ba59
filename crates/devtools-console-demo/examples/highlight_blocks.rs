use devtools_console::{CodeBlockRenderer, Config, HighlightService, TokenHighlighter};
use devtools_console_demo::sample_blocks;
use tokio::runtime::Handle;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let service = HighlightService::spawn(
        TokenHighlighter,
        config.cache_builder().runtime(Handle::current()),
    )?;
    let renderer = CodeBlockRenderer::new(service.clone());

    for (name, block) in sample_blocks() {
        let first = renderer.render(&block);
        let settled = renderer.render_settled(&block).await;
        println!("--- {name}");
        println!("first paint: {:?}", first.state);
        println!("settled: {:?}", settled.state);
        println!("{}\n", settled.html);
    }

    // a second page using the same blocks is served from the cache
    for (_, block) in sample_blocks() {
        renderer.render(&block);
    }

    println!("{}", serde_json::to_string_pretty(&service.stats())?);
    Ok(())
}
