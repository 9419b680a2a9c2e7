use actix::{Actor, Addr, AsyncContext, Context, Handler, Message, WrapFuture};
use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::room::RoomId;

/// Message to post text into a room
#[derive(Message, Debug, Clone, PartialEq, Eq)]
#[rtype(result = "()")]
pub struct Announce {
    pub room: RoomId,
    pub text: String,
}

/// Actor that relays announcements into Discord channels.
///
/// Every channel gets its own [`ChannelPoster`], so a room sees its messages in
/// the order the game produced them while a slow channel holds up only itself.
pub struct DiscordAnnouncer {
    http: Arc<serenity::Http>,
    posters: HashMap<RoomId, Addr<ChannelPoster>>,
}

impl DiscordAnnouncer {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self {
            http,
            posters: HashMap::new(),
        }
    }

    fn poster_for(&mut self, room: &RoomId) -> Option<Addr<ChannelPoster>> {
        if let Some(poster) = self.posters.get(room) {
            return Some(poster.clone());
        }

        let channel_id = match room.as_str().parse::<u64>() {
            Ok(id) if id != 0 => serenity::ChannelId::new(id),
            _ => {
                warn!("Cannot announce to '{}': not a Discord channel id", room);
                return None;
            }
        };

        debug!("Starting poster for channel {}", room);
        let poster = ChannelPoster {
            channel_id,
            http: self.http.clone(),
        }
        .start();
        self.posters.insert(room.clone(), poster.clone());

        Some(poster)
    }
}

impl Actor for DiscordAnnouncer {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        debug!("DiscordAnnouncer started");
    }
}

impl Handler<Announce> for DiscordAnnouncer {
    type Result = ();

    fn handle(&mut self, msg: Announce, _ctx: &mut Context<Self>) -> Self::Result {
        if let Some(poster) = self.poster_for(&msg.room) {
            poster.do_send(msg);
        }
    }
}

/// Posts one channel's announcements, one at a time
struct ChannelPoster {
    channel_id: serenity::ChannelId,
    http: Arc<serenity::Http>,
}

impl Actor for ChannelPoster {
    type Context = Context<Self>;
}

impl Handler<Announce> for ChannelPoster {
    type Result = ();

    fn handle(&mut self, msg: Announce, ctx: &mut Context<Self>) -> Self::Result {
        let channel_id = self.channel_id;
        let http = self.http.clone();
        let Announce { room, text } = msg;

        // Hold the mailbox until the post is done
        ctx.wait(
            async move {
                if let Err(e) = channel_id.say(&*http, text).await {
                    error!("Failed to send message to {}: {}", room, e);
                }
            }
            .into_actor(self),
        );
    }
}
