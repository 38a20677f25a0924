//! URL 工具：站点地址校验、相对地址补全、下载地址规范化与标题回退。

const ALBUM_PATH: &str = "/game-soundtracks/album/";

/// 专辑页地址必须形如 `//<站点主机>/game-soundtracks/album/...`。
pub fn is_album_url(url: &str, base_url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }
    let host = base_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(base_url)
        .trim_end_matches('/');
    url.contains(&format!("//{host}{ALBUM_PATH}"))
}

/// 把页面中的 href/src 补全为绝对地址。
pub fn absolutize(href: &str, base_url: &str) -> String {
    let href = href.trim();
    let base = base_url.trim_end_matches('/');
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        let scheme = base.split_once("://").map(|(s, _)| s).unwrap_or("https");
        format!("{scheme}://{rest}")
    } else if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}

/// 解码一次百分号编码；非 UTF-8 结果按有损方式还原。
pub fn decode_once(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned(),
    }
}

/// 百分号编码，保留 `/` 与 `:` 不转义。
pub fn encode_keeping_separators(decoded: &str) -> String {
    let mut out = String::with_capacity(decoded.len());
    for (i, segment) in decoded.split('/').enumerate() {
        if i > 0 {
            out.push('/');
        }
        for (j, piece) in segment.split(':').enumerate() {
            if j > 0 {
                out.push(':');
            }
            out.push_str(&urlencoding::encode(piece));
        }
    }
    out
}

/// 先解码一次（消除 `%2520` 一类的重复编码），再按请求需要重新编码。
pub fn normalize_download_url(raw: &str) -> String {
    encode_keeping_separators(&decode_once(raw.trim()))
}

/// 从地址最后一段推出曲目标题：`%20` 还原为空格，去掉 `.mp3` 后缀。
pub fn title_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
    let spaced = last.replace("%20", " ");
    spaced
        .strip_suffix(".mp3")
        .unwrap_or(spaced.as_str())
        .to_string()
}
