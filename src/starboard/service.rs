use std::sync::atomic::{AtomicBool, Ordering};

use futures::{pin_mut, Stream, StreamExt};
use serenity::all::MessageId;
use tokio::sync::{watch, RwLock};

use crate::database::database::Database;
use crate::starboard::cache::{Filter, StarCache};
use crate::starboard::payload::{BoardEntry, BoardMessage, StarredMessagePayload};
use crate::starboard::{StarboardError, StarboardResult};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Readiness {
    WarmingUp,
    Ready,
    Closed,
}

/// Keeps the starred message cache and the store in step. Every operation waits for
/// the warm-up to finish first.
pub struct Starboard {
    database: Database,
    cache: RwLock<StarCache>,
    readiness: watch::Sender<Readiness>,
    started: AtomicBool,
}

impl Starboard {
    pub fn new(database: Database) -> Self {
        let (readiness, _) = watch::channel(Readiness::WarmingUp);
        Starboard { database, cache: RwLock::new(StarCache::default()), readiness, started: AtomicBool::new(false) }
    }

    pub fn is_ready(&self) -> bool {
        *self.readiness.borrow() == Readiness::Ready
    }

    fn ensure_open(&self) -> StarboardResult<()> {
        match *self.readiness.borrow() {
            Readiness::Closed => Err(StarboardError::Closed),
            _ => Ok(()),
        }
    }

    pub async fn wait_until_ready(&self) -> StarboardResult<()> {
        let mut readiness = self.readiness.subscribe();
        let state = *readiness.wait_for(|state| *state != Readiness::WarmingUp).await.map_err(|_| StarboardError::Closed)?;

        match state {
            Readiness::Ready => Ok(()),
            _ => Err(StarboardError::Closed),
        }
    }

    /// Loads the store into the cache, then walks `history` newest first until the
    /// last recorded board entry. Only the first call does anything, and never after
    /// [`Starboard::close`].
    #[tracing::instrument(skip_all)]
    pub async fn initialize<S, E>(&self, history: S) -> StarboardResult<()>
    where
        S: Stream<Item = Result<BoardMessage, E>>,
        E: Into<anyhow::Error>,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            return self.ensure_open();
        }

        tracing::info!("Initialising starboard cache...");
        match self.warm_up(history).await {
            Ok(added) => {
                let cached = self.len().await;
                tracing::info!("Starboard cache ready with {} entries ({} from history)", cached, added);
                self.readiness.send_replace(Readiness::Ready);
                Ok(())
            }
            Err(e) => {
                self.readiness.send_replace(Readiness::Closed);
                Err(e)
            }
        }
    }

    async fn warm_up<S, E>(&self, history: S) -> StarboardResult<usize>
    where
        S: Stream<Item = Result<BoardMessage, E>>,
        E: Into<anyhow::Error>,
    {
        let mut cache = self.cache.write().await;
        let mut tx = self.database.begin_transaction().await?;

        let mut settings = tx.load_settings()?;
        *cache = StarCache::from_payloads(tx.load_starred_messages()?);

        let previous = settings.recent_id;
        let mut newest = None;
        let mut added = 0;

        pin_mut!(history);
        while let Some(message) = history.next().await {
            let message = message.map_err(|e| StarboardError::History(e.into()))?;
            if newest.is_none() {
                newest = Some(message.id);
            }
            if Some(message.id) == previous {
                break;
            }
            if cache.contains_star(message.id) {
                continue;
            }

            let Some(entry) = BoardEntry::parse(&message.text) else {
                continue;
            };
            let payload = StarredMessagePayload::resolve(&message, &entry);
            if cache.contains(&payload) {
                continue;
            }

            tx.save_starred_message(&payload)?;
            cache.insert(payload);
            added += 1;
        }

        if newest.is_some() && newest != previous {
            settings.recent_id = newest;
            tx.save_settings(&settings)?;
        }

        Ok(added)
    }

    /// Returns false if the entry was already known.
    pub async fn add(&self, message: &BoardMessage) -> StarboardResult<bool> {
        self.wait_until_ready().await?;

        let entry = BoardEntry::parse(&message.text).ok_or(StarboardError::Malformed(message.id))?;
        let payload = StarredMessagePayload::resolve(message, &entry);

        let mut cache = self.cache.write().await;
        self.ensure_open()?;
        if cache.contains(&payload) {
            return Ok(false);
        }

        let mut tx = self.database.begin_transaction().await?;
        if !tx.save_starred_message(&payload)? {
            tracing::debug!("Starred message {} was already stored", payload.message_id);
        }
        let mut settings = tx.load_settings()?;
        settings.recent_id = Some(message.id);
        tx.save_settings(&settings)?;

        cache.insert(payload);
        Ok(true)
    }

    /// Store first, then cache. A row missing from the store is written back whole.
    pub async fn update(&self, content: &str, stars: i64, id: MessageId) -> StarboardResult<StarredMessagePayload> {
        self.wait_until_ready().await?;

        let mut cache = self.cache.write().await;
        self.ensure_open()?;
        let mut updated = cache.find(id).cloned().ok_or(StarboardError::NotFound(id))?;
        updated.content = content.to_string();
        updated.stars = stars;

        let mut tx = self.database.begin_transaction().await?;
        if tx.update_starred_message(content, stars, id)? == 0 {
            tx.save_starred_message(&updated)?;
        }

        if let Some(payload) = cache.find_mut(id) {
            payload.content = updated.content.clone();
            payload.stars = updated.stars;
        }
        Ok(updated)
    }

    /// Returns whether anything was removed.
    pub async fn delete(&self, id: MessageId) -> StarboardResult<bool> {
        self.wait_until_ready().await?;

        let mut cache = self.cache.write().await;
        self.ensure_open()?;
        let mut tx = self.database.begin_transaction().await?;
        let deleted = tx.delete_starred_message(id)?;

        let removed = cache.remove(id).is_some();
        Ok(deleted > 0 || removed)
    }

    /// First payload matching every filter, `None` when nothing does.
    pub async fn get(&self, filters: &[Filter]) -> StarboardResult<Option<StarredMessagePayload>> {
        self.wait_until_ready().await?;

        let cache = self.cache.read().await;
        let found = cache.matching(filters).next().cloned();
        Ok(found)
    }

    /// Every payload matching every filter, in no particular order.
    pub async fn query(&self, filters: &[Filter]) -> StarboardResult<impl Iterator<Item = StarredMessagePayload>> {
        self.wait_until_ready().await?;

        let cache = self.cache.read().await;
        let found: Vec<StarredMessagePayload> = cache.matching(filters).cloned().collect();
        Ok(found.into_iter())
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Writes the cache back to the store and refuses any further work, including a
    /// warm-up that has not started yet. The connection pool itself is released when
    /// the last handle to the starboard is dropped with the bot.
    pub async fn close(&self) -> StarboardResult<()> {
        if !self.started.swap(true, Ordering::SeqCst) {
            self.readiness.send_replace(Readiness::Closed);
            return Ok(());
        }
        if self.wait_until_ready().await.is_err() {
            return Ok(());
        }

        let cache = self.cache.write().await;
        let flushed = self.flush(&cache).await;
        self.readiness.send_replace(Readiness::Closed);

        let flushed = flushed?;
        if flushed > 0 {
            tracing::warn!("Flushed {} starred messages missing from the store", flushed);
        }
        tracing::info!("Starboard closed");
        Ok(())
    }

    async fn flush(&self, cache: &StarCache) -> StarboardResult<usize> {
        let mut tx = self.database.begin_transaction().await?;
        Ok(tx.save_starred_messages(cache.iter())?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::stream;
    use serenity::all::ChannelId;

    use super::*;
    use crate::database::database::Settings;
    use crate::starboard::payload::tests::board_message;

    type History = Vec<anyhow::Result<BoardMessage>>;

    fn entry(board_id: u64, stars: i64, message_id: u64) -> BoardMessage {
        board_message(board_id, &format!("**{stars}** <#10> ID: {message_id}"))
    }

    async fn ready_starboard(database: Database, history: History) -> Starboard {
        let starboard = Starboard::new(database);
        starboard.initialize(stream::iter(history)).await.unwrap();
        starboard
    }

    async fn stored_count(database: &Database) -> i64 {
        database.begin_transaction().await.unwrap().count_starred_messages().unwrap()
    }

    #[tokio::test]
    async fn added_entries_are_found_once_by_either_id() {
        let database = Database::in_memory().unwrap();
        let starboard = ready_starboard(database.clone(), vec![]).await;

        assert!(starboard.add(&entry(500, 3, 20)).await.unwrap());

        for filter in [Filter::Id(MessageId::new(20)), Filter::Id(MessageId::new(500)), Filter::MessageId(MessageId::new(20)), Filter::StarId(MessageId::new(500))] {
            assert_eq!(starboard.query(&[filter]).await.unwrap().count(), 1);
            assert_eq!(starboard.get(&[filter]).await.unwrap().map(|p| p.star_id), Some(MessageId::new(500)));
        }
        assert_eq!(stored_count(&database).await, 1);
    }

    #[tokio::test]
    async fn adding_twice_changes_nothing() {
        let database = Database::in_memory().unwrap();
        let starboard = ready_starboard(database.clone(), vec![]).await;

        assert!(starboard.add(&entry(500, 3, 20)).await.unwrap());
        assert!(!starboard.add(&entry(500, 3, 20)).await.unwrap());

        assert_eq!(starboard.len().await, 1);
        assert_eq!(stored_count(&database).await, 1);
    }

    #[tokio::test]
    async fn malformed_live_entries_are_reported() {
        let starboard = ready_starboard(Database::in_memory().unwrap(), vec![]).await;

        let result = starboard.add(&board_message(501, "just chatting")).await;
        assert!(matches!(result, Err(StarboardError::Malformed(id)) if id == MessageId::new(501)));
        assert_eq!(starboard.len().await, 0);
    }

    #[tokio::test]
    async fn update_changes_only_content_and_stars() {
        let database = Database::in_memory().unwrap();
        let starboard = ready_starboard(database.clone(), vec![]).await;
        starboard.add(&entry(500, 3, 20)).await.unwrap();
        let before = starboard.get(&[Filter::Id(MessageId::new(20))]).await.unwrap().unwrap();

        starboard.update("**4** <#10> ID: 20", 4, MessageId::new(20)).await.unwrap();

        let after = starboard.get(&[Filter::Id(MessageId::new(20))]).await.unwrap().unwrap();
        assert_eq!((after.content.as_str(), after.stars), ("**4** <#10> ID: 20", 4));
        assert_eq!((after.message_id, after.star_id, after.author_id, after.channel_id, after.created_at), (before.message_id, before.star_id, before.author_id, before.channel_id, before.created_at));

        let stored = database.begin_transaction().await.unwrap().load_starred_messages().unwrap();
        assert_eq!(stored, vec![after]);
    }

    #[tokio::test]
    async fn updating_an_unknown_id_is_not_found() {
        let starboard = ready_starboard(Database::in_memory().unwrap(), vec![]).await;

        let result = starboard.update("x", 1, MessageId::new(77)).await;
        assert!(matches!(result, Err(StarboardError::NotFound(id)) if id == MessageId::new(77)));
    }

    #[tokio::test]
    async fn deleted_entries_are_gone_from_cache_and_store() {
        let database = Database::in_memory().unwrap();
        let starboard = ready_starboard(database.clone(), vec![]).await;
        starboard.add(&entry(500, 3, 20)).await.unwrap();

        assert!(starboard.delete(MessageId::new(500)).await.unwrap());
        assert!(!starboard.delete(MessageId::new(500)).await.unwrap());

        assert_eq!(starboard.get(&[Filter::Id(MessageId::new(20))]).await.unwrap(), None);
        assert_eq!(stored_count(&database).await, 0);
    }

    #[tokio::test]
    async fn backfill_stops_at_the_recent_id() {
        let database = Database::in_memory().unwrap();
        {
            let mut tx = database.begin_transaction().await.unwrap();
            let known = entry(400, 2, 40);
            tx.save_starred_message(&StarredMessagePayload::resolve(&known, &BoardEntry::parse(&known.text).unwrap())).unwrap();
            tx.save_settings(&Settings { recent_id: Some(MessageId::new(400)) }).unwrap();
        }

        let history = vec![Ok(entry(600, 1, 60)), Ok(board_message(550, "not an entry")), Ok(entry(500, 5, 50)), Ok(entry(400, 2, 40)), Ok(entry(300, 9, 30))];
        let starboard = ready_starboard(database.clone(), history).await;

        assert_eq!(starboard.len().await, 3);
        assert!(starboard.get(&[Filter::Id(MessageId::new(30))]).await.unwrap().is_none());
        assert_eq!(stored_count(&database).await, 3);

        let settings = database.begin_transaction().await.unwrap().load_settings().unwrap();
        assert_eq!(settings.recent_id, Some(MessageId::new(600)));
    }

    #[tokio::test]
    async fn backfill_skips_entries_already_stored() {
        let database = Database::in_memory().unwrap();
        let first = ready_starboard(database.clone(), vec![Ok(entry(500, 5, 50))]).await;
        first.close().await.unwrap();

        // recent_id forgotten, history rescanned in full
        database.begin_transaction().await.unwrap().save_settings(&Settings::default()).unwrap();
        let second = ready_starboard(database.clone(), vec![Ok(entry(600, 1, 60)), Ok(entry(500, 5, 50))]).await;

        assert_eq!(second.len().await, 2);
        assert_eq!(stored_count(&database).await, 2);
    }

    #[tokio::test]
    async fn queries_wait_for_the_warm_up() {
        let database = Database::in_memory().unwrap();
        let starboard = Arc::new(Starboard::new(database));

        let waiting = Arc::clone(&starboard);
        let mut pending = tokio::spawn(async move { waiting.get(&[Filter::Id(MessageId::new(50))]).await });

        assert!(tokio::time::timeout(Duration::from_millis(50), &mut pending).await.is_err());
        assert!(!starboard.is_ready());

        starboard.initialize(stream::iter(vec![Ok::<_, anyhow::Error>(entry(500, 5, 50))])).await.unwrap();

        let found = pending.await.unwrap().unwrap();
        assert_eq!(found.map(|p| p.channel_id), Some(ChannelId::new(10)));
    }

    #[tokio::test]
    async fn failed_history_releases_waiters_as_closed() {
        let starboard = Starboard::new(Database::in_memory().unwrap());

        let result = starboard.initialize(stream::iter(vec![Err::<BoardMessage, _>(anyhow::anyhow!("gateway gone"))])).await;

        assert!(matches!(result, Err(StarboardError::History(_))));
        assert!(matches!(starboard.get(&[]).await, Err(StarboardError::Closed)));
    }

    #[tokio::test]
    async fn closing_refuses_further_work_and_keeps_data() {
        let database = Database::in_memory().unwrap();
        let starboard = ready_starboard(database.clone(), vec![Ok(entry(500, 5, 50))]).await;

        starboard.close().await.unwrap();
        assert!(matches!(starboard.add(&entry(600, 1, 60)).await, Err(StarboardError::Closed)));

        let reopened = ready_starboard(database, vec![]).await;
        assert_eq!(reopened.get(&[Filter::Stars(5)]).await.unwrap().map(|p| p.message_id), Some(MessageId::new(50)));
    }

    #[tokio::test]
    async fn closing_before_the_warm_up_returns_immediately() {
        let starboard = Starboard::new(Database::in_memory().unwrap());

        starboard.close().await.unwrap();
        assert!(matches!(starboard.wait_until_ready().await, Err(StarboardError::Closed)));
    }

    #[tokio::test]
    async fn a_late_warm_up_does_not_reopen_a_closed_starboard() {
        let starboard = Starboard::new(Database::in_memory().unwrap());
        starboard.close().await.unwrap();

        let result = starboard.initialize(stream::iter(History::new())).await;

        assert!(matches!(result, Err(StarboardError::Closed)));
        assert!(!starboard.is_ready());
        assert!(matches!(starboard.add(&entry(500, 3, 20)).await, Err(StarboardError::Closed)));
    }

    #[tokio::test]
    async fn writes_queued_behind_close_are_refused() {
        let database = Database::in_memory().unwrap();
        let starboard = Arc::new(ready_starboard(database.clone(), vec![Ok(entry(500, 5, 50))]).await);

        let held = starboard.cache.write().await;
        let closing = tokio::spawn({
            let starboard = Arc::clone(&starboard);
            async move { starboard.close().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let adding = tokio::spawn({
            let starboard = Arc::clone(&starboard);
            async move { starboard.add(&entry(600, 1, 60)).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        closing.await.unwrap().unwrap();
        assert!(matches!(adding.await.unwrap(), Err(StarboardError::Closed)));
        assert_eq!(starboard.len().await, 1);
        assert_eq!(stored_count(&database).await, 1);
    }

    #[tokio::test]
    async fn store_failures_leave_the_cache_untouched() {
        let database = Database::in_memory().unwrap();
        let starboard = ready_starboard(database.clone(), vec![]).await;
        starboard.add(&entry(500, 3, 20)).await.unwrap();

        database.begin_transaction().await.unwrap().execute_batch("DROP TABLE starboard").unwrap();

        assert!(matches!(starboard.update("**9** <#10> ID: 20", 9, MessageId::new(20)).await, Err(StarboardError::Storage(_))));
        assert_eq!(starboard.get(&[Filter::Id(MessageId::new(20))]).await.unwrap().map(|p| p.stars), Some(3));

        assert!(matches!(starboard.add(&entry(600, 1, 60)).await, Err(StarboardError::Storage(_))));
        assert_eq!(starboard.len().await, 1);

        assert!(matches!(starboard.delete(MessageId::new(500)).await, Err(StarboardError::Storage(_))));
        assert!(starboard.get(&[Filter::StarId(MessageId::new(500))]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn closing_writes_back_rows_missing_from_the_store() {
        let database = Database::in_memory().unwrap();
        let starboard = ready_starboard(database.clone(), vec![]).await;
        starboard.add(&entry(500, 3, 20)).await.unwrap();

        database.begin_transaction().await.unwrap().delete_starred_message(MessageId::new(20)).unwrap();
        assert_eq!(stored_count(&database).await, 0);

        starboard.close().await.unwrap();

        let stored = database.begin_transaction().await.unwrap().load_starred_messages().unwrap();
        assert_eq!(stored.into_iter().map(|p| (p.message_id, p.star_id)).collect::<Vec<_>>(), vec![(MessageId::new(20), MessageId::new(500))]);
    }

    #[tokio::test]
    async fn concurrent_adds_store_one_row() {
        let database = Database::in_memory().unwrap();
        let starboard = ready_starboard(database.clone(), vec![]).await;
        let message = entry(500, 3, 20);

        let (first, second) = tokio::join!(starboard.add(&message), starboard.add(&message));

        let mut added = [first.unwrap(), second.unwrap()];
        added.sort();
        assert_eq!(added, [false, true]);
        assert_eq!(starboard.len().await, 1);
        assert_eq!(stored_count(&database).await, 1);
    }
}
