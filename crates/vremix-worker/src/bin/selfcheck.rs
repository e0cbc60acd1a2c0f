use std::path::Path;
use std::process::Command;

use vremix_media::TranscodeRunner;
use vremix_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();
    let out_dir = std::env::args().nth(1).unwrap_or_else(|| "output".to_string());

    println!("vremix-selfcheck: starting with out_dir={}", out_dir);
    ensure_out_dir(&out_dir).await?;
    ensure_ffmpeg(&config)?;
    check_ffprobe(&config);

    let compiler = config.build_compiler()?;
    println!(
        "vremix-selfcheck: {} filters, {} anchors",
        compiler.catalog().len(),
        compiler.anchors().names().count()
    );

    println!("vremix-selfcheck: ok");
    Ok(())
}

async fn ensure_out_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_ffmpeg(config: &WorkerConfig) -> anyhow::Result<()> {
    let binary = config
        .build_runner()
        .check_available()
        .map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;

    let output = Command::new(&binary)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("ffmpeg not runnable: {}", e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "ffmpeg -version failed: {:?}",
            output.status
        ));
    }
    println!("vremix-selfcheck: ffmpeg at {}", binary.display());
    Ok(())
}

fn check_ffprobe(config: &WorkerConfig) {
    match config.build_probe().binary() {
        Ok(path) => println!("vremix-selfcheck: ffprobe at {}", path.display()),
        Err(e) => println!("vremix-selfcheck: warning: {}, audio detection disabled", e),
    }
}
