use std::collections::HashMap;
use std::sync::Arc;

use serenity::all::{ChannelId, Context, Member, Message, MessageId, MessageUpdateEvent, Ready};
use serenity::async_trait;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventKind {
    Ready,
    Message,
    MessageUpdate,
    MessageDelete,
    MemberJoin,
}

/// A gateway event as handed to cogs.
pub enum CogEvent<'a> {
    Ready(&'a Ready),
    Message(&'a Message),
    MessageUpdate(&'a MessageUpdateEvent),
    MessageDelete { channel_id: ChannelId, message_id: MessageId },
    MemberJoin(&'a Member),
}

impl CogEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            CogEvent::Ready(_) => EventKind::Ready,
            CogEvent::Message(_) => EventKind::Message,
            CogEvent::MessageUpdate(_) => EventKind::MessageUpdate,
            CogEvent::MessageDelete { .. } => EventKind::MessageDelete,
            CogEvent::MemberJoin(_) => EventKind::MemberJoin,
        }
    }
}

#[async_trait]
pub trait Cog: Send + Sync {
    fn name(&self) -> &'static str;

    /// Events this cog wants, read once when the registry is built.
    fn events(&self) -> &'static [EventKind];

    async fn handle(&self, ctx: &Context, event: &CogEvent<'_>) -> anyhow::Result<()>;
}

/// Which cogs handle which event, fixed at startup.
#[derive(Default, Clone)]
pub struct EventRegistry {
    handlers: HashMap<EventKind, Vec<Arc<dyn Cog>>>,
}

impl EventRegistry {
    pub fn new(cogs: &[Arc<dyn Cog>]) -> Self {
        let mut handlers: HashMap<EventKind, Vec<Arc<dyn Cog>>> = HashMap::new();
        for cog in cogs {
            for kind in cog.events() {
                handlers.entry(*kind).or_default().push(Arc::clone(cog));
            }
        }
        EventRegistry { handlers }
    }

    pub fn handlers(&self, kind: EventKind) -> &[Arc<dyn Cog>] {
        self.handlers.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Listening(&'static str, &'static [EventKind]);

    #[async_trait]
    impl Cog for Listening {
        fn name(&self) -> &'static str {
            self.0
        }

        fn events(&self) -> &'static [EventKind] {
            self.1
        }

        async fn handle(&self, _ctx: &Context, _event: &CogEvent<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn maps_each_event_to_its_listeners_in_order() {
        let cogs: Vec<Arc<dyn Cog>> = vec![
            Arc::new(Listening("core", &[EventKind::Ready, EventKind::MemberJoin])),
            Arc::new(Listening("starboard", &[EventKind::Ready, EventKind::Message, EventKind::MessageDelete])),
            Arc::new(Listening("emotes", &[EventKind::Message])),
        ];
        let registry = EventRegistry::new(&cogs);

        let names = |kind| registry.handlers(kind).iter().map(|cog| cog.name()).collect::<Vec<_>>();
        assert_eq!(names(EventKind::Ready), vec!["core", "starboard"]);
        assert_eq!(names(EventKind::Message), vec!["starboard", "emotes"]);
        assert_eq!(names(EventKind::MemberJoin), vec!["core"]);
        assert!(names(EventKind::MessageUpdate).is_empty());
    }

    #[test]
    fn delete_events_report_their_kind() {
        let event = CogEvent::MessageDelete { channel_id: ChannelId::new(1), message_id: MessageId::new(2) };
        assert_eq!(event.kind(), EventKind::MessageDelete);
    }
}
