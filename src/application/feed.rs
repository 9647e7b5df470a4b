use async_trait::async_trait;
use serde::Serialize;

/// トップページに表示する件数
pub const HOME_VIDEO_LIMIT: usize = 6;

/// 動画
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Video {
    pub title: String,
    pub link: String,
    pub thumbnail: Option<String>,
}

/// 動画フィード
///
/// 取得に失敗しても空の一覧を返す。
#[async_trait]
pub trait VideoFeed: Send + Sync {
    async fn latest(&self, limit: usize) -> Vec<Video>;
}

/// 何も返さないフィード
pub struct NoVideos;

#[async_trait]
impl VideoFeed for NoVideos {
    async fn latest(&self, _limit: usize) -> Vec<Video> {
        Vec::new()
    }
}
