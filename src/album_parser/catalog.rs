//! 专辑页解析：标题 + 按页面顺序排列的曲目条目。

use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{info, warn};

use super::url_utils::absolutize;
use crate::base_system::context::sanitize_filename;
use crate::base_system::retry::RetryPolicy;
use crate::download::models::{Album, TrackStub};
use crate::network_parser::network::{FetchError, SiteNetwork};

pub const UNKNOWN_ALBUM: &str = "Unknown Album";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// 页面结构与预期不符，重试也不会改变结果。
    #[error("no track list found")]
    MissingTrackList,
}

fn sel_title() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("h2, h1").expect("valid title selector"))
}

fn sel_song_list() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("#songlist").expect("valid songlist selector"))
}

fn sel_row() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("tr").expect("valid row selector"))
}

fn sel_clickable_cell() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("td.clickable-row").expect("valid cell selector"))
}

fn sel_link() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("a").expect("valid link selector"))
}

/// 抓取并解析专辑页。页面请求按 `policy` 重试，结构错误不重试。
pub fn fetch_album(
    network: &SiteNetwork,
    album_url: &str,
    policy: &RetryPolicy,
) -> Result<Album, CatalogError> {
    let html = network.fetch_text(album_url, policy)?;
    let album = parse_album_page(&html, album_url, network.base_url())?;
    info!("找到专辑: {} ({} 首曲目)", album.title, album.tracks.len());
    Ok(album)
}

pub fn parse_album_page(
    html: &str,
    source_url: &str,
    base_url: &str,
) -> Result<Album, CatalogError> {
    let doc = Html::parse_document(html);
    let title = sanitize_filename(&album_title(&doc));

    let Some(song_list) = doc.select(sel_song_list()).next() else {
        warn!("{} 中没有找到曲目列表", source_url);
        return Err(CatalogError::MissingTrackList);
    };

    let tracks = song_list
        .select(sel_row())
        .filter_map(|row| track_from_row(row, base_url))
        .collect();

    Ok(Album {
        title,
        source_url: source_url.to_string(),
        tracks,
    })
}

/// 页面上第一个标题元素；优先 `h2`（站点把专辑名放在 h2 中）。
fn album_title(doc: &Html) -> String {
    let mut h1 = None;
    for heading in doc.select(sel_title()) {
        let text = collapse_text(heading);
        if text.is_empty() {
            continue;
        }
        if heading.value().name() == "h2" {
            return text;
        }
        h1.get_or_insert(text);
    }
    h1.unwrap_or_else(|| UNKNOWN_ALBUM.to_string())
}

fn track_from_row(row: ElementRef<'_>, base_url: &str) -> Option<TrackStub> {
    let cell = row.select(sel_clickable_cell()).next()?;
    let link = cell.select(sel_link()).next()?;
    let href = link.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    Some(TrackStub {
        name: collapse_text(link),
        detail_url: absolutize(href, base_url),
    })
}

fn collapse_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Route, TestSite, album_page, test_config};
    use std::time::Duration;

    const BASE: &str = "https://downloads.khinsider.com";
    const ALBUM: &str = "https://downloads.khinsider.com/game-soundtracks/album/test";

    #[test]
    fn malformed_rows_are_skipped() {
        let html = r#"
            <h2>Test: Soundtrack</h2>
            <table id="songlist">
              <tr id="songlist_header"><th>#</th><th>Song Name</th></tr>
              <tr><td class="clickable-row"><a href="/game-soundtracks/album/test/01.mp3"> Opening </a></td></tr>
              <tr><td class="clickable-row">no link here</td></tr>
              <tr><td class="clickable-row"><a href="/game-soundtracks/album/test/02.mp3">Battle</a></td></tr>
              <tr><td><a href="/game-soundtracks/album/test/extra.mp3">not clickable</a></td></tr>
              <tr><td class="clickable-row"><a href="/game-soundtracks/album/test/03.mp3">Ending</a></td></tr>
            </table>"#;

        let album = parse_album_page(html, ALBUM, BASE).unwrap();

        assert_eq!(album.title, "Test_ Soundtrack");
        let names: Vec<&str> = album.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Opening", "Battle", "Ending"]);
        assert_eq!(
            album.tracks[0].detail_url,
            "https://downloads.khinsider.com/game-soundtracks/album/test/01.mp3"
        );
    }

    #[test]
    fn missing_song_list_is_a_structural_error() {
        let err = parse_album_page("<h2>Album</h2><p>nothing</p>", ALBUM, BASE).unwrap_err();
        assert!(matches!(err, CatalogError::MissingTrackList));
        assert_eq!(err.to_string(), "no track list found");
    }

    #[test]
    fn empty_song_list_yields_album_without_tracks() {
        let album = parse_album_page(
            r#"<h2>Album</h2><table id="songlist"><tr><th>#</th></tr></table>"#,
            ALBUM,
            BASE,
        )
        .unwrap();
        assert!(album.tracks.is_empty());
    }

    #[test]
    fn title_defaults_when_heading_absent() {
        let album =
            parse_album_page(r#"<table id="songlist"></table>"#, ALBUM, BASE).unwrap();
        assert_eq!(album.title, UNKNOWN_ALBUM);
    }

    #[test]
    fn album_heading_is_preferred_over_site_banner() {
        let album = parse_album_page(
            r#"<h1>KHInsider</h1><h2>Real Album</h2><table id="songlist"></table>"#,
            ALBUM,
            BASE,
        )
        .unwrap();
        assert_eq!(album.title, "Real Album");
    }

    #[test]
    fn fetch_album_reads_page_over_http() {
        let page = album_page("Live Album", &[("One", "/game-soundtracks/album/live/1.mp3")]);
        let site = TestSite::start(vec![("/game-soundtracks/album/live", Route::html(&page))]);
        let net = SiteNetwork::new(&test_config(&site.base_url, "")).unwrap();

        let album = fetch_album(
            &net,
            &site.url("/game-soundtracks/album/live"),
            &RetryPolicy::new(2, Duration::ZERO),
        )
        .unwrap();

        assert_eq!(album.title, "Live Album");
        assert_eq!(album.tracks.len(), 1);
        assert_eq!(
            album.tracks[0].detail_url,
            site.url("/game-soundtracks/album/live/1.mp3")
        );
    }
}
