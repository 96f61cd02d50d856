#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = milestack_grading::run_grader().await {
        eprintln!("grade fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
