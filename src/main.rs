//! khinsider 专辑下载器。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/重试等基础设施
//! - `network_parser`：站点 HTTP 访问
//! - `album_parser`：专辑页、曲目详情页解析与标签写入
//! - `download`：单文件下载引擎、worker 池与专辑编排

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;

mod album_parser;
mod base_system;
mod download;
mod network_parser;
#[cfg(test)]
mod test_support;

use album_parser::url_utils::is_album_url;
use base_system::config::{ConfigSpec, load_or_default, save};
use base_system::context::{Config, DownloadContext};
use base_system::logging::{LogOptions, LogSystem};
use download::downloader::download_albums;
use download::models::AudioFormat;
use download::progress::ProgressHub;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "khinsider-downloader", version)]
#[command(about = "Download full albums from downloads.khinsider.com")]
struct Cli {
    /// 专辑页地址（可重复）
    #[arg(short = 'u', long = "url")]
    urls: Vec<String>,

    /// 批量地址文件：每行一个地址，空行和 `#` 开头的行会被忽略
    #[arg(short = 'i', long)]
    input_file: Option<PathBuf>,

    /// 输出目录（覆盖配置文件）
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// 同时下载的曲目数
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// 格式优先级，逗号分隔，例如 `flac,mp3`
    #[arg(short = 'f', long, value_delimiter = ',')]
    format: Vec<AudioFormat>,

    /// 文件名不加曲目序号
    #[arg(long, default_value_t = false)]
    no_track_numbers: bool,

    /// 把当前生效的配置（含命令行覆盖）写回配置文件
    #[arg(long, default_value_t = false)]
    save_config: bool,

    /// 配置文件路径（默认为当前目录下的 khinsider_config.json）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log = init_logging(cli.debug)?;
    info!(target: "startup", "当前版本: v{}", VERSION);

    let mut config: Config = load_or_default(cli.config.as_deref());
    apply_overrides(&mut config, &cli);
    let config = config.normalized();

    if cli.save_config {
        let path = save(&config, cli.config.as_deref()).context("保存配置失败")?;
        println!("配置已保存到 {}", path.display());
    }

    let mut urls = cli.urls.clone();
    if let Some(path) = &cli.input_file {
        urls.extend(read_url_file(path)?);
    }
    if urls.is_empty() {
        match prompt_for_url(&config)? {
            Some(url) => urls.push(url),
            None => {
                println!("已退出。");
                return Ok(());
            }
        }
    }

    let ctx = DownloadContext::new(config, ProgressHub::stderr())
        .context("初始化 HTTP 客户端失败")?
        .with_pending(log.pending_albums());
    let succeeded = download_albums(&urls, &ctx);

    println!("{}/{} albums succeeded", succeeded, urls.len());
    println!("文件保存在: {}", ctx.config.output_root().display());
    Ok(())
}

fn init_logging(debug: bool) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        console: true,
    };
    LogSystem::init(opts).map_err(|e| anyhow!(e))
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(dir) = &cli.output_dir {
        config.output_directory = dir.to_string_lossy().into_owned();
    }
    if let Some(threads) = cli.threads {
        config.max_threads = threads;
    }
    if !cli.format.is_empty() {
        config.format_preference = cli.format.clone();
    }
    if cli.no_track_numbers {
        config.include_track_number = false;
    }
}

fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("读取地址文件 {} 失败", path.display()))?;
    Ok(parse_url_list(&text))
}

fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// 循环询问，直到得到一个合法的专辑地址；输入 `q` 或读到 EOF 返回 `None`。
fn prompt_for_url(config: &Config) -> Result<Option<String>> {
    loop {
        let Some(input) = read_line("请输入专辑地址（q 退出）：")? else {
            return Ok(None);
        };
        let text = input.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        if is_album_url(text, &config.base_url) {
            return Ok(Some(text.to_string()));
        }
        println!(
            "地址格式不正确，应形如 {}/game-soundtracks/album/<专辑名>",
            config.base_url
        );
    }
}

fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    Ok((read > 0).then_some(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_list_skips_blank_and_comment_lines() {
        let text = "\n# favourites\nhttps://downloads.khinsider.com/game-soundtracks/album/a\n   \n  https://downloads.khinsider.com/game-soundtracks/album/b  \n#https://skipped\n";
        assert_eq!(
            parse_url_list(text),
            vec![
                "https://downloads.khinsider.com/game-soundtracks/album/a",
                "https://downloads.khinsider.com/game-soundtracks/album/b",
            ]
        );
    }

    #[test]
    fn cli_overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "khinsider-downloader",
            "-o",
            "/tmp/music",
            "-t",
            "6",
            "-f",
            "MP3,ogg",
            "--no-track-numbers",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.output_directory, "/tmp/music");
        assert_eq!(config.max_threads, 6);
        assert_eq!(config.format_preference, vec![AudioFormat::Mp3, AudioFormat::Ogg]);
        assert!(!config.include_track_number);
    }

    #[test]
    fn unknown_format_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["khinsider-downloader", "-f", "wma"]).is_err());
    }
}
