//! 测试用的本地站点：基于 tiny_http，按路径返回固定内容并统计命中次数。

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tiny_http::{Header, Response, Server, StatusCode};

use crate::base_system::context::{Config, DownloadContext};
use crate::download::progress::ProgressHub;

pub enum Route {
    Html(String),
    Bytes(Vec<u8>),
    Status(u16),
}

impl Route {
    pub fn html(body: &str) -> Self {
        Self::Html(body.to_string())
    }

    pub fn bytes(body: Vec<u8>) -> Self {
        Self::Bytes(body)
    }
}

pub struct TestSite {
    pub base_url: String,
    server: Arc<Server>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl TestSite {
    pub fn start<P: Into<String>>(routes: Vec<(P, Route)>) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind test server"));
        let addr = server
            .server_addr()
            .to_ip()
            .expect("test server listens on ip");
        let routes: HashMap<String, Route> = routes
            .into_iter()
            .map(|(path, route)| (path.into(), route))
            .collect();
        let hits = Arc::new(Mutex::new(HashMap::new()));

        let srv = Arc::clone(&server);
        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            for request in srv.incoming_requests() {
                let path = request.url().to_string();
                *counter.lock().unwrap().entry(path.clone()).or_insert(0) += 1;
                let _ = match routes.get(&path) {
                    Some(Route::Html(body)) => request.respond(
                        Response::from_string(body.clone()).with_header(
                            Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
                                .unwrap(),
                        ),
                    ),
                    Some(Route::Bytes(body)) => request.respond(Response::from_data(body.clone())),
                    Some(Route::Status(code)) => {
                        request.respond(Response::empty(StatusCode(*code)))
                    }
                    None => request.respond(Response::empty(StatusCode(404))),
                };
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            server,
            hits,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

impl Drop for TestSite {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

/// 直接操作 socket 的 HTTP 服务：读完请求头后把连接交给 `respond`，
/// 用来构造 tiny_http 做不到的响应（正文中途断开、逐段慢速发送）。
/// 返回根地址和已接受的连接数。
pub fn raw_http_server<F>(respond: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(&mut TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind raw server");
    let addr = listener.local_addr().expect("raw server address");
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            counter.fetch_add(1, Ordering::SeqCst);
            read_request_head(&mut stream);
            respond(&mut stream);
            let _ = stream.flush();
        }
    });

    (format!("http://{addr}"), connections)
}

fn read_request_head(stream: &mut TcpStream) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
}

pub fn write_audio_head(stream: &mut TcpStream, content_length: usize) {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: {content_length}\r\nConnection: close\r\n\r\n"
    );
    let _ = stream.write_all(head.as_bytes());
}

/// 测试配置：重试无间隔，网络地址指向本地站点。
pub fn test_config(base_url: &str, output_dir: &str) -> Config {
    Config {
        output_directory: output_dir.to_string(),
        max_threads: 3,
        retry_attempts: 3,
        retry_delay: 0.0,
        request_timeout: 10,
        base_url: base_url.to_string(),
        ..Config::default()
    }
}

pub fn test_context(config: Config) -> DownloadContext {
    DownloadContext::new(config, ProgressHub::hidden()).expect("build test context")
}

/// 一个最简单的专辑页：`h2` 标题 + `#songlist` 表格。
pub fn album_page(title: &str, tracks: &[(&str, &str)]) -> String {
    let rows: String = tracks
        .iter()
        .map(|(name, href)| {
            format!(
                r#"<tr><td class="playlistDownloadSong"></td><td class="clickable-row"><a href="{href}">{name}</a></td><td class="clickable-row"><a href="{href}">3:00</a></td></tr>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><h1>Site</h1><h2>{title}</h2><table id="songlist"><tr id="songlist_header"><th>#</th><th>Song Name</th></tr>{rows}</table></body></html>"#
    )
}

/// 曲目详情页：`links` 为 (格式标记, href, 大小 MB)，可选 `<audio src>`。
pub fn detail_page(title: &str, links: &[(&str, &str, Option<f64>)], audio_src: Option<&str>) -> String {
    let mut body = format!(r#"<p align="left"><b>Album name</b>: <b>{title}</b></p>"#);
    if let Some(src) = audio_src {
        body.push_str(&format!(r#"<audio controls src="{src}"></audio>"#));
    }
    for (label, href, size) in links {
        let size = size.map(|mb| format!(" ({mb} MB)")).unwrap_or_default();
        body.push_str(&format!(
            r#"<p><a href="{href}"><span class="songDownloadLink">Click here to download as {label}</span></a>{size}</p>"#
        ));
    }
    format!("<html><body>{body}</body></html>")
}
