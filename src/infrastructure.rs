pub mod core;
pub mod feed;
pub mod mail;
pub mod memory;

use std::{collections::BTreeMap, fmt::Display, str::FromStr, sync::Arc};

use eventstore::{
    AppendToStreamOptions, Client, ClientSettings, EventData, ExpectedRevision,
    ReadStreamOptions, ResolvedEvent,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::application::{feed::VideoFeed, notify::Mailer, Repositories};
use crate::domain::{Aggregation, DataAccessError, Entity, Event, Id};
use crate::{Backend, NatursurConfig, Storage, Studio};

use self::core::{
    EventStoreOfferingRepository, EventStoreReservationRepository, EventStoreUserRepository,
};
use self::feed::YoutubeFeed;
use self::mail::{ConsoleMailer, ResendMailer};
use self::memory::{MemoryOfferingRepository, MemoryReservationRepository, MemoryUserRepository};

/// 設定に従って保存先を用意する
pub fn repositories(storage: &Storage) -> Result<Repositories, DataAccessError> {
    match storage.backend {
        Backend::Memory => {
            info!("メモリ上のリポジトリを使用します");
            Ok(memory_repositories())
        }
        Backend::EventStore => {
            let settings = storage
                .url
                .parse::<ClientSettings>()
                .map_err(|e| DataAccessError::ConnectionError(e.to_string().into()))?;
            let client = Client::new(settings)?;
            info!("EventStoreDB を使用します");
            Ok(Repositories {
                offerings: Arc::new(EventStoreOfferingRepository::new(client.clone())),
                reservations: Arc::new(EventStoreReservationRepository::new(client.clone())),
                users: Arc::new(EventStoreUserRepository::new(client)),
            })
        }
    }
}

pub fn memory_repositories() -> Repositories {
    Repositories {
        offerings: Arc::new(MemoryOfferingRepository::new()),
        reservations: Arc::new(MemoryReservationRepository::new()),
        users: Arc::new(MemoryUserRepository::new()),
    }
}

/// デバッグ時または API キーがない場合はログに出すだけ
pub fn mailer(config: &NatursurConfig) -> Arc<dyn Mailer> {
    match (&config.mail.api_key, config.server.debug) {
        (Some(api_key), false) => Arc::new(ResendMailer::new(
            config.mail.api_url.clone(),
            api_key.clone(),
            config.mail.from.clone(),
        )),
        (None, false) => {
            warn!("メール API キーが未設定のため、メールはログに出力されます");
            Arc::new(ConsoleMailer)
        }
        (_, true) => Arc::new(ConsoleMailer),
    }
}

pub fn video_feed(studio: &Studio) -> Arc<dyn VideoFeed> {
    Arc::new(YoutubeFeed::new(studio.youtube_channel_id.clone()))
}

impl From<eventstore::Error> for DataAccessError {
    fn from(value: eventstore::Error) -> Self {
        match value {
            eventstore::Error::ConnectionClosed
            | eventstore::Error::Grpc { .. }
            | eventstore::Error::GrpcConnectionError(_)
            | eventstore::Error::DeadlineExceeded
            | eventstore::Error::InitializationError(_) => Self::ConnectionError(Box::new(value)),
            eventstore::Error::ServerError(_)
            | eventstore::Error::NotLeaderException(_)
            | eventstore::Error::AccessDenied
            | eventstore::Error::UnsupportedFeature
            | eventstore::Error::InternalParsingError(_)
            | eventstore::Error::InternalClientError => Self::QueryError(Box::new(value)),
            eventstore::Error::ResourceNotFound | eventstore::Error::ResourceDeleted => {
                Self::ReadError(Box::new(value))
            }
            eventstore::Error::ResourceAlreadyExists
            | eventstore::Error::WrongExpectedVersion { .. } => Self::WriteError(Box::new(value)),
            eventstore::Error::IllegalStateError(_) => Self::ClientSideError(Box::new(value)),
        }
    }
}

impl From<EventConvertError> for DataAccessError {
    fn from(value: EventConvertError) -> Self {
        DataAccessError::ClientSideError(Box::new(value))
    }
}

#[derive(Debug)]
pub struct EventConvertError;

impl std::error::Error for EventConvertError {}

impl Display for EventConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to convert event")
    }
}

impl From<serde_json::Error> for EventConvertError {
    fn from(_value: serde_json::Error) -> Self {
        EventConvertError
    }
}

fn entity_id<I, T>(stream_id: &str) -> Option<I>
where
    I: Id<Inner = T>,
    T: FromStr,
{
    stream_id
        .split('-')
        .filter_map(|s| s.parse::<T>().ok())
        .map(I::from)
        .last()
}

fn stream_name<E: Entity>(id: E::Id) -> String {
    E::ENTITY_NAME.to_owned() + "-" + &id.to_string()
}

fn category_stream<E: Entity>() -> String {
    "$ce-".to_owned() + E::ENTITY_NAME
}

/// `{"Variant": {..}}` を (イベント種別, IDを除いたデータ) に分ける
fn encode_event<E: Event>(event: &E) -> Result<(String, Value), EventConvertError> {
    let root = serde_json::to_value(event)?;
    let (event_type, data) = root
        .as_object()
        .and_then(|o| o.iter().next())
        .ok_or(EventConvertError)?;
    let mut data = data.clone();
    data.as_object_mut().ok_or(EventConvertError)?.remove("id");
    Ok((event_type.clone(), data))
}

fn decode_event<E, I>(stream_id: &str, event_type: &str, data: &[u8]) -> Result<E, EventConvertError>
where
    E: DeserializeOwned + Event<Id = I>,
    I: Id,
{
    let id = entity_id::<I, I::Inner>(stream_id).ok_or(EventConvertError)?;
    let mut data: Value = serde_json::from_slice(data)?;
    data.as_object_mut()
        .ok_or(EventConvertError)?
        .insert("id".to_owned(), json!(id));
    let json = json!({ event_type: data });
    Ok(serde_json::from_value(json)?)
}

fn to_event_data<E: Event>(event: &E) -> Result<EventData, EventConvertError> {
    let (event_type, data) = encode_event(event)?;
    Ok(EventData::json(event_type, data)?)
}

fn from_resolved_event<E>(value: &ResolvedEvent) -> Option<Result<E, EventConvertError>>
where
    E: DeserializeOwned + Event,
    E::Id: Id,
{
    // カテゴリストリームのリンク先が消えている場合は None
    let event = value.event.as_ref()?;
    Some(decode_event(
        &event.stream_id,
        &event.event_type,
        event.data.as_ref(),
    ))
}

/// エンティティのストリームを読み込んで復元する
async fn load<A>(client: &Client, id: A::Id) -> Result<Option<A>, DataAccessError>
where
    A: Aggregation,
    A::Event: DeserializeOwned,
{
    let mut stream = match client
        .read_stream(stream_name::<A>(id), &Default::default())
        .await
    {
        Ok(stream) => stream,
        Err(eventstore::Error::ResourceDeleted) | Err(eventstore::Error::ResourceNotFound) => {
            return Ok(None)
        }
        Err(e) => return Err(e.into()),
    };
    let mut entity = A::default();
    loop {
        match stream.next().await {
            Ok(Some(resolved)) => match from_resolved_event::<A::Event>(&resolved) {
                Some(event) => {
                    let event = event?;
                    if event.is_terminal() {
                        return Ok(None);
                    }
                    entity.apply(event);
                }
                None => continue,
            },
            Ok(None) => break,
            Err(eventstore::Error::ResourceDeleted) => return Ok(None),
            Err(eventstore::Error::ResourceNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
    if entity.peek().is_none() {
        Ok(None)
    } else {
        entity.clear();
        Ok(Some(entity))
    }
}

/// カテゴリストリーム `$ce-<entity>` から全エンティティを復元する
///
/// EventStoreDB の `$by_category` プロジェクションが有効である必要がある。
async fn load_all<A>(client: &Client) -> Result<Vec<A>, DataAccessError>
where
    A: Aggregation,
    A::Event: DeserializeOwned,
{
    let options = ReadStreamOptions::default().resolve_link_tos();
    let mut stream = match client.read_stream(category_stream::<A>(), &options).await {
        Ok(stream) => stream,
        Err(eventstore::Error::ResourceNotFound) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut entities = BTreeMap::<String, A>::new();
    loop {
        match stream.next().await {
            Ok(Some(resolved)) => {
                let Some(event) = from_resolved_event::<A::Event>(&resolved) else {
                    continue;
                };
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("読み込めないイベントをスキップしました: {}", e);
                        continue;
                    }
                };
                let key = resolved
                    .event
                    .as_ref()
                    .map(|e| e.stream_id.clone())
                    .unwrap_or_default();
                if event.is_terminal() {
                    entities.remove(&key);
                } else {
                    entities.entry(key).or_default().apply(event);
                }
            }
            Ok(None) => break,
            Err(eventstore::Error::ResourceNotFound) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(entities
        .into_values()
        .filter(|entity| entity.peek().is_some())
        .map(|mut entity| {
            entity.clear();
            entity
        })
        .collect())
}

/// 未保存のイベントを追記する
async fn append<A>(
    client: &Client,
    entity: &mut A,
    created: fn(&A::Event) -> bool,
) -> Result<bool, DataAccessError>
where
    A: Aggregation,
{
    let stream_name = stream_name::<A>(entity.id());
    let rev = match entity.peek() {
        Some(event) if created(event) => ExpectedRevision::NoStream,
        Some(_) => ExpectedRevision::StreamExists,
        None => return Ok(false),
    };
    let events = entity
        .iter()
        .map(to_event_data)
        .collect::<Result<Vec<_>, _>>()?;
    client
        .append_to_stream(
            &stream_name,
            &AppendToStreamOptions::default().expected_revision(rev),
            events,
        )
        .await?;
    entity.clear();
    Ok(true)
}

/// 削除イベントを追記してからストリームを削除する
async fn remove<A>(client: &Client, entity: &A, deleted: A::Event) -> Result<bool, DataAccessError>
where
    A: Aggregation,
{
    let stream_name = stream_name::<A>(entity.id());
    client
        .append_to_stream(
            &stream_name,
            &AppendToStreamOptions::default().expected_revision(ExpectedRevision::StreamExists),
            to_event_data(&deleted)?,
        )
        .await?;
    client
        .delete_stream(&stream_name, &Default::default())
        .await?;
    Ok(true)
}
