//! 曲目详情页解析：按格式优先级挑选下载地址。
//!
//! 解析分三层：
//! 1. 页面上 "Click here to download as <FORMAT>" 的显式下载链接；
//! 2. 没有匹配的显式链接时，退回到 `<audio src>`，并在需要 FLAC 时探测同名 `.flac`；
//! 3. 标题取自 `p[align=left]` 中的第二个 `<b>`，没有则从地址推出。
//!
//! 找不到可用链接是正常结果（返回 `None`），由调用方记为失败曲目。

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, info, warn};

use super::url_utils::{absolutize, normalize_download_url, title_from_url};
use crate::base_system::retry::RetryPolicy;
use crate::download::models::{AudioFormat, ResolvedTrack};
use crate::network_parser::network::SiteNetwork;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

fn re_download_label() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"Click here to download as\s+([A-Za-z0-9]+)").expect("compile RE_LABEL"))
}

fn re_size_mb() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\(\s*(\d+(?:[.,]\d+)?)\s*MB\s*\)").expect("compile RE_SIZE"))
}

fn sel_link() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("a[href]").expect("valid link selector"))
}

fn sel_audio() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("audio[src]").expect("valid audio selector"))
}

fn sel_title_paragraph() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse(r#"p[align="left"]"#).expect("valid paragraph selector"))
}

fn sel_bold() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("b").expect("valid bold selector"))
}

/// 详情页上的一条显式下载链接。
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledLink {
    pub format: AudioFormat,
    pub url: String,
    pub size_mb: Option<f64>,
}

/// 详情页中与下载有关的全部信息，不含网络访问。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPage {
    pub title: Option<String>,
    pub labelled: Vec<LabelledLink>,
    pub audio_src: Option<String>,
}

impl DetailPage {
    pub fn parse(html: &str, base_url: &str) -> Self {
        let doc = Html::parse_document(html);

        let labelled = doc
            .select(sel_link())
            .filter_map(|link| labelled_link(link, base_url))
            .collect();

        let audio_src = doc
            .select(sel_audio())
            .filter_map(|audio| audio.value().attr("src"))
            .map(str::trim)
            .find(|src| !src.is_empty())
            .map(|src| absolutize(src, base_url));

        let title = doc
            .select(sel_title_paragraph())
            .next()
            .and_then(|p| p.select(sel_bold()).nth(1))
            .map(|b| b.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        Self {
            title,
            labelled,
            audio_src,
        }
    }
}

fn labelled_link(link: ElementRef<'_>, base_url: &str) -> Option<LabelledLink> {
    let text = link.text().collect::<String>();
    let token = re_download_label().captures(&text)?.get(1)?.as_str();
    let format = token.parse::<AudioFormat>().ok()?;
    let href = link.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }

    // 大小一般写在链接所在段落里，例如 "(32.5 MB)"
    let context = link
        .parent()
        .and_then(ElementRef::wrap)
        .map(|p| p.text().collect::<String>())
        .unwrap_or(text);

    Some(LabelledLink {
        format,
        url: absolutize(href, base_url),
        size_mb: parse_size_mb(&context),
    })
}

/// 解析 `(<number> MB)`；缺失、无法解析或为 0 时视为未知。
pub fn parse_size_mb(text: &str) -> Option<f64> {
    let caps = re_size_mb().captures(text)?;
    let value = caps.get(1)?.as_str().replace(',', ".").parse::<f64>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// 严格按 `preference` 顺序取第一个有候选的格式；同一格式取页面上的第一条链接。
pub fn pick_preferred<'a>(
    labelled: &'a [LabelledLink],
    preference: &[AudioFormat],
) -> Option<&'a LabelledLink> {
    preference
        .iter()
        .find_map(|wanted| labelled.iter().find(|link| link.format == *wanted))
}

pub struct TrackResolver<'a> {
    network: &'a SiteNetwork,
    policy: RetryPolicy,
}

impl<'a> TrackResolver<'a> {
    pub fn new(network: &'a SiteNetwork, policy: RetryPolicy) -> Self {
        Self { network, policy }
    }

    pub fn resolve(&self, detail_url: &str, preference: &[AudioFormat]) -> Option<ResolvedTrack> {
        let html = match self.network.fetch_text(detail_url, &self.policy) {
            Ok(html) => html,
            Err(err) => {
                error!("获取曲目页面失败: {}", err);
                return None;
            }
        };
        let page = DetailPage::parse(&html, self.network.base_url());
        let resolved = self.resolve_page(page, detail_url, preference);
        if resolved.is_none() {
            warn!("没有找到可用的下载链接: {}", detail_url);
        }
        resolved
    }

    fn resolve_page(
        &self,
        page: DetailPage,
        detail_url: &str,
        preference: &[AudioFormat],
    ) -> Option<ResolvedTrack> {
        let title = page
            .title
            .clone()
            .unwrap_or_else(|| title_from_url(detail_url));

        if let Some(link) = pick_preferred(&page.labelled, preference) {
            debug!("{} 使用显式链接 ({})", title, link.format);
            return Some(ResolvedTrack {
                download_url: normalize_download_url(&link.url),
                format: link.format,
                expected_size: link.size_mb.map(mb_to_bytes),
                title,
            });
        }

        let audio_src = normalize_download_url(page.audio_src.as_deref()?);
        if preference.contains(&AudioFormat::Flac)
            && let Some(stem) = audio_src.strip_suffix(".mp3")
        {
            let flac_url = format!("{stem}.flac");
            if self.network.probe(&flac_url) {
                info!("{} 通过探测找到 FLAC 版本", title);
                return Some(ResolvedTrack {
                    download_url: flac_url,
                    format: AudioFormat::Flac,
                    title,
                    expected_size: None,
                });
            }
        }

        Some(ResolvedTrack {
            download_url: audio_src,
            format: AudioFormat::Mp3,
            title,
            expected_size: None,
        })
    }
}

fn mb_to_bytes(mb: f64) -> u64 {
    (mb * BYTES_PER_MB).round() as u64
}
