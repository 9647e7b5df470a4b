use std::time::Duration;

use async_trait::async_trait;
use quick_xml::{events::Event, Reader};
use reqwest::Client;
use tracing::warn;

use crate::application::feed::{Video, VideoFeed};

const FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml?channel_id=";
const TIMEOUT: Duration = Duration::from_secs(5);

/// YouTube チャンネルの Atom フィード
pub struct YoutubeFeed {
    client: Client,
    channel_id: String,
}

impl YoutubeFeed {
    pub fn new(channel_id: String) -> Self {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, channel_id }
    }

    pub fn url(&self) -> String {
        FEED_URL.to_owned() + self.channel_id.trim()
    }

    async fn fetch(&self) -> Result<String, reqwest::Error> {
        self.client
            .get(self.url())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl VideoFeed for YoutubeFeed {
    async fn latest(&self, limit: usize) -> Vec<Video> {
        if self.channel_id.trim().is_empty() {
            return Vec::new();
        }
        let xml = match self.fetch().await {
            Ok(xml) => xml,
            Err(e) => {
                warn!("動画フィードを取得できませんでした: {}", e);
                return Vec::new();
            }
        };
        match parse_feed(&xml, limit) {
            Ok(videos) => videos,
            Err(e) => {
                warn!("動画フィードを解析できませんでした: {}", e);
                Vec::new()
            }
        }
    }
}

/// Atom フィードから `entry` を読み出す
fn parse_feed(xml: &str, limit: usize) -> Result<Vec<Video>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut videos = Vec::new();
    let mut entry: Option<Video> = None;
    let mut in_title = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"entry" => {
                    entry = Some(Video {
                        title: String::new(),
                        link: String::new(),
                        thumbnail: None,
                    })
                }
                b"title" => in_title = entry.is_some(),
                _ => {}
            },
            Event::Empty(e) => {
                if let Some(video) = entry.as_mut() {
                    match e.name().as_ref() {
                        b"link" => {
                            if let Some(href) = e.try_get_attribute("href")? {
                                video.link = href.unescape_value()?.into_owned();
                            }
                        }
                        b"media:thumbnail" => {
                            if let Some(url) = e.try_get_attribute("url")? {
                                video.thumbnail = Some(url.unescape_value()?.into_owned());
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Text(text) => {
                if in_title {
                    if let Some(video) = entry.as_mut() {
                        video.title = text.unescape()?.into_owned();
                    }
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"title" => in_title = false,
                b"entry" => {
                    if let Some(video) = entry.take() {
                        if !video.link.is_empty() {
                            videos.push(video);
                        }
                    }
                    if videos.len() >= limit {
                        break;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(videos)
}
