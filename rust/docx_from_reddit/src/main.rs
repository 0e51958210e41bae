use anyhow::{anyhow, Context, Result};
use clap::Parser;
use docx_from_reddit::docx::{DocumentBuilder, DEFAULT_INDENT_MM};
use docx_from_reddit::fetch::HttpFetcher;
use docx_from_reddit::reddit::{RedditApi, DEFAULT_BASE_URL};
use docx_from_reddit::stitch::Sink;
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Converts a reddit thread to .docx")]
struct Args {
    /// Link to a reddit thread, e.g. "https://www.reddit.com/r/SUBREDDIT/comments/THREAD_ID".
    #[arg(short, long)]
    input: String,

    /// Destination .docx. Defaults to the thread title in the current directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Origin for deep links and API calls.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, default_value = "docx_from_reddit")]
    user_agent: String,

    /// Indentation per reply level, in millimetres. Lower it for very deep threads.
    #[arg(long, default_value_t = DEFAULT_INDENT_MM)]
    indent_mm: f64,
}

fn file_name_for(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-')
        .collect();
    let stem = kept.trim();
    if stem.is_empty() {
        "thread.docx".to_string()
    } else {
        format!("{stem}.docx")
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.indent_mm.is_nan() || args.indent_mm < 0.0 {
        return Err(anyhow!("indent must be a non-negative number of millimetres"));
    }

    let fetcher = HttpFetcher::new(&args.user_agent)?;
    let api = RedditApi::new(fetcher, &args.base_url);

    let page = api
        .page(&args.input)
        .with_context(|| format!("retrieve {}", args.input))?;
    let thread = docx_from_reddit::reconstruct(&api, &page)
        .with_context(|| format!("reconstruct {}", args.input))?;

    let mut doc = DocumentBuilder::new(args.indent_mm);
    doc.title(&thread.info.title, &thread.info.url);
    for emission in thread.emissions {
        doc.accept(emission);
    }

    let out = args
        .output
        .unwrap_or_else(|| PathBuf::from(file_name_for(&thread.info.title)));
    doc.save(&out)?;
    info!("wrote {} messages to {}", doc.message_count(), out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_drops_punctuation() {
        assert_eq!(file_name_for("What's up? [Serious] - 2024"), "Whats up Serious - 2024.docx");
        assert_eq!(file_name_for("???"), "thread.docx");
    }

    #[test]
    fn cli_defaults() {
        let args = Args::parse_from(["docx_from_reddit", "-i", "https://www.reddit.com/r/x/comments/1"]);
        assert_eq!(args.base_url, DEFAULT_BASE_URL);
        assert_eq!(args.indent_mm, DEFAULT_INDENT_MM);
        assert!(args.output.is_none());
    }
}
