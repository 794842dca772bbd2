//! Gateway events and the registry that routes them to listeners.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serenity::client::{Context, EventHandler};
use serenity::model::channel::{Message, Reaction};
use serenity::model::gateway::Ready;
use tracing::{debug, info, warn};

use crate::meeting_vote::discord::{proposal_from_message, reaction_event};
use crate::meeting_vote::platform::{ProposalMessage, ReactionEvent};

/// Kinds of platform events listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageCreate,
    ReactionAdd,
}

#[derive(Debug, Clone)]
pub enum BotEvent {
    MessageCreate(ProposalMessage),
    ReactionAdd(ReactionEvent),
}

impl BotEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageCreate(_) => EventKind::MessageCreate,
            Self::ReactionAdd(_) => EventKind::ReactionAdd,
        }
    }

    fn guild_id(&self) -> Option<u64> {
        match self {
            Self::MessageCreate(m) => m.guild_id,
            Self::ReactionAdd(r) => r.guild_id,
        }
    }
}

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Something that reacts to one kind of event.
#[async_trait]
pub trait Listener: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> EventKind;

    async fn handle(&self, event: &BotEvent) -> Result<(), ListenerError>;
}

/// Listeners keyed by the event kind they handle.
#[derive(Default)]
pub struct Registry {
    listeners: HashMap<EventKind, Vec<Arc<dyn Listener>>>,
    /// When set, events from other guilds are dropped.
    guild_id: Option<u64>,
}

impl Registry {
    pub fn new(guild_id: Option<u64>) -> Self {
        Self { listeners: HashMap::new(), guild_id }
    }

    pub fn register(&mut self, listener: Arc<dyn Listener>) {
        self.listeners.entry(listener.kind()).or_default().push(listener);
    }

    /// Run every listener for the event in registration order.
    ///
    /// A failing listener is logged and does not stop the others. Returns the
    /// number of listeners that ran.
    pub async fn dispatch(&self, event: BotEvent) -> usize {
        if let Some(guild_id) = self.guild_id
            && event.guild_id() != Some(guild_id)
        {
            debug!("Dropping {:?} from another guild", event.kind());
            return 0;
        }

        let Some(listeners) = self.listeners.get(&event.kind()) else {
            return 0;
        };
        for listener in listeners {
            if let Err(e) = listener.handle(&event).await {
                warn!("Listener {} failed: {e}", listener.name());
            }
        }
        listeners.len()
    }
}

/// serenity event handler feeding the registry.
pub struct Handler {
    registry: Registry,
}

impl Handler {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("👌 ready: {}", ready.user.name);
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        self.registry
            .dispatch(BotEvent::MessageCreate(proposal_from_message(&msg)))
            .await;
    }

    async fn reaction_add(&self, ctx: Context, add_reaction: Reaction) {
        let user = match add_reaction.user(&ctx).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Failed to fetch reacting user: {e}");
                return;
            }
        };
        self.registry
            .dispatch(BotEvent::ReactionAdd(reaction_event(&add_reaction, &user)))
            .await;
    }
}
