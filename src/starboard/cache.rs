use std::collections::HashMap;

use indexmap::IndexMap;
use serenity::all::{ChannelId, MessageId, UserId};

use crate::starboard::payload::StarredMessagePayload;

/// One attribute a cached payload must match. `Id` matches either identity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Filter {
    Id(MessageId),
    MessageId(MessageId),
    StarId(MessageId),
    AuthorId(UserId),
    ChannelId(ChannelId),
    Stars(i64),
}

impl Filter {
    pub fn matches(&self, payload: &StarredMessagePayload) -> bool {
        match *self {
            Filter::Id(id) => payload.has_id(id),
            Filter::MessageId(id) => payload.message_id == id,
            Filter::StarId(id) => payload.star_id == id,
            Filter::AuthorId(id) => payload.author_id == id,
            Filter::ChannelId(id) => payload.channel_id == id,
            Filter::Stars(stars) => payload.stars == stars,
        }
    }
}

/// Payloads keyed by source message, with a secondary index on the board entry id.
#[derive(Default, Debug)]
pub struct StarCache {
    by_message: IndexMap<MessageId, StarredMessagePayload>,
    by_star: HashMap<MessageId, MessageId>,
}

impl StarCache {
    pub fn from_payloads(payloads: impl IntoIterator<Item = StarredMessagePayload>) -> Self {
        let mut cache = StarCache::default();
        for payload in payloads {
            cache.insert(payload);
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.by_message.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StarredMessagePayload> {
        self.by_message.values()
    }

    pub fn contains(&self, payload: &StarredMessagePayload) -> bool {
        self.by_message.contains_key(&payload.message_id) || self.by_star.contains_key(&payload.star_id)
    }

    pub fn contains_star(&self, star_id: MessageId) -> bool {
        self.by_star.contains_key(&star_id)
    }

    /// No-op when either id is already cached.
    pub fn insert(&mut self, payload: StarredMessagePayload) -> bool {
        if self.contains(&payload) {
            return false;
        }
        self.by_star.insert(payload.star_id, payload.message_id);
        self.by_message.insert(payload.message_id, payload);
        true
    }

    fn key_for(&self, id: MessageId) -> Option<MessageId> {
        if self.by_message.contains_key(&id) {
            Some(id)
        } else {
            self.by_star.get(&id).copied()
        }
    }

    pub fn find(&self, id: MessageId) -> Option<&StarredMessagePayload> {
        self.key_for(id).and_then(|key| self.by_message.get(&key))
    }

    pub fn find_mut(&mut self, id: MessageId) -> Option<&mut StarredMessagePayload> {
        let key = self.key_for(id)?;
        self.by_message.get_mut(&key)
    }

    pub fn remove(&mut self, id: MessageId) -> Option<StarredMessagePayload> {
        let key = self.key_for(id)?;
        let payload = self.by_message.swap_remove(&key)?;
        self.by_star.remove(&payload.star_id);
        Some(payload)
    }

    fn lookup(&self, filter: &Filter) -> Option<Vec<&StarredMessagePayload>> {
        match *filter {
            Filter::MessageId(id) => Some(self.by_message.get(&id).into_iter().collect()),
            Filter::StarId(id) => Some(self.by_star.get(&id).and_then(|key| self.by_message.get(key)).into_iter().collect()),
            Filter::Id(id) => {
                let mut found: Vec<&StarredMessagePayload> = self.by_message.get(&id).into_iter().collect();
                if let Some(payload) = self.by_star.get(&id).and_then(|key| self.by_message.get(key)) {
                    if payload.message_id != id {
                        found.push(payload);
                    }
                }
                Some(found)
            }
            _ => None,
        }
    }

    /// Payloads matching every filter. Identity filters go through the indexes,
    /// anything else scans.
    pub fn matching<'a>(&'a self, filters: &'a [Filter]) -> impl Iterator<Item = &'a StarredMessagePayload> + 'a {
        let candidates: Box<dyn Iterator<Item = &'a StarredMessagePayload> + 'a> = match filters.iter().find_map(|filter| self.lookup(filter)) {
            Some(found) => Box::new(found.into_iter()),
            None => Box::new(self.by_message.values()),
        };

        candidates.filter(move |payload| filters.iter().all(|filter| filter.matches(payload)))
    }
}
