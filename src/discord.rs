use actix::{Actor, Addr, Arbiter, ArbiterHandle};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::{
    actors::DiscordAnnouncer,
    config::Config,
    registry::{describe_points, SessionRegistry},
    room::RoomId,
    store::{aliases::describe_aliases, statistics::describe_hall_of_fame, TriviaStore},
    Data, Error, Result,
};

pub type Context<'a> = poise::Context<'a, Data, Error>;

impl From<serenity::ChannelId> for RoomId {
    fn from(channel_id: serenity::ChannelId) -> Self {
        RoomId::new(channel_id.get().to_string())
    }
}

/// Start a trivia game in this channel
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn trivia_start(
    ctx: Context<'_>,
    #[description = "Number of questions"] num_questions: Option<u32>,
) -> Result<()> {
    let room = RoomId::from(ctx.channel_id());
    let count = num_questions.map(|n| n as usize);

    match ctx.data().registry.start_session(&room, count).await {
        Ok(drawn) => {
            info!(
                "Trivia game started in {} by {} with {} question(s)",
                room,
                ctx.author().name,
                drawn
            );
            ctx.say(format!("Trivia started with {drawn} question(s)!"))
                .await?;
        }
        Err(e) => {
            warn!("Could not start trivia in {}: {}", room, e);
            ctx.say(e.to_string()).await?;
        }
    }

    Ok(())
}

/// Stop the trivia game in this channel without saving its scores
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn trivia_stop(ctx: Context<'_>) -> Result<()> {
    let room = RoomId::from(ctx.channel_id());

    if ctx.data().registry.stop_session(&room).await {
        info!("Trivia game stopped in {} by {}", room, ctx.author().name);
        ctx.say("Trivia stopped.").await?;
    } else {
        ctx.say("No trivia game is in progress here.").await?;
    }

    Ok(())
}

/// Skip the current question
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn skip(ctx: Context<'_>) -> Result<()> {
    let room = RoomId::from(ctx.channel_id());

    if ctx.data().registry.skip_current_question(&room).await {
        ctx.say("Question skipped.").await?;
    } else {
        ctx.say("There is no question to skip.").await?;
    }

    Ok(())
}

/// Count the points of `alias` towards `nick`
#[poise::command(slash_command, prefix_command, required_permissions = "ADMINISTRATOR")]
pub async fn trivia_alias_add(
    ctx: Context<'_>,
    #[description = "Original nick"] nick: String,
    #[description = "Alias of the nick"] alias: String,
) -> Result<()> {
    ctx.data().registry.add_alias(&nick, &alias).await?;
    ctx.say(format!("'{alias}' is now an alias of '{nick}'."))
        .await?;
    Ok(())
}

/// Stop counting the points of `alias` towards `nick`
#[poise::command(slash_command, prefix_command, required_permissions = "ADMINISTRATOR")]
pub async fn trivia_alias_remove(
    ctx: Context<'_>,
    #[description = "Original nick"] nick: String,
    #[description = "Alias of the nick"] alias: String,
) -> Result<()> {
    if ctx.data().registry.remove_alias(&nick, &alias).await? {
        ctx.say(format!("'{alias}' is no longer an alias of '{nick}'."))
            .await?;
    } else {
        ctx.say(format!("'{alias}' was not an alias of '{nick}'."))
            .await?;
    }
    Ok(())
}

/// List the aliases of a nick
#[poise::command(slash_command, prefix_command, required_permissions = "ADMINISTRATOR")]
pub async fn trivia_alias_list(
    ctx: Context<'_>,
    #[description = "Nick to look up"] nick: String,
) -> Result<()> {
    let aliases = ctx.data().registry.list_aliases(&nick).await?;
    ctx.say(describe_aliases(&nick, &aliases)).await?;
    Ok(())
}

/// Show the hall of fame of this channel
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn hof(ctx: Context<'_>) -> Result<()> {
    let room = RoomId::from(ctx.channel_id());
    let entries = ctx.data().registry.hall_of_fame(&room).await?;
    ctx.say(describe_hall_of_fame(&room, &entries)).await?;
    Ok(())
}

/// Show the points of a user in this channel
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn stats(
    ctx: Context<'_>,
    #[description = "User to look up (defaults to you)"] user: Option<String>,
) -> Result<()> {
    let room = RoomId::from(ctx.channel_id());
    let user_name = user.unwrap_or_else(|| ctx.author().name.clone());
    let points = ctx.data().registry.user_points(&room, &user_name).await?;
    ctx.say(describe_points(&user_name, points)).await?;
    Ok(())
}

/// Every plain chat line in a guild channel is a potential answer
async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<()> {
    if let serenity::FullEvent::Message { new_message } = event {
        // Ignore bots and private messages
        if new_message.author.bot || new_message.guild_id.is_none() {
            return Ok(());
        }

        let content = new_message.content.trim();
        if content.is_empty() || content.starts_with('!') {
            return Ok(());
        }

        let room = RoomId::from(new_message.channel_id);
        if data
            .registry
            .submit_answer(&room, &new_message.author.name, content)
            .await
        {
            debug!("Accepted answer from {} in {}", new_message.author.name, room);
        }
    }
    Ok(())
}

/// Run the actor system on its own thread and hand back where to start
/// game sessions and the announcer that posts their messages
async fn spawn_actor_system(
    http: Arc<serenity::Http>,
) -> Result<(ArbiterHandle, Addr<DiscordAnnouncer>)> {
    let (tx, rx) = oneshot::channel();

    let _actor_thread = thread::spawn(move || {
        let system = actix_rt::System::new();

        system.block_on(async {
            let announcer = DiscordAnnouncer::new(http).start();

            if tx.send((Arbiter::current(), announcer)).is_err() {
                error!("Failed to send actor system handles");
            }

            // Keep this thread (and with it every game session) alive until shutdown
            tokio::signal::ctrl_c().await.ok();
        });

        info!("Actor system thread exiting");
    });

    rx.await
        .map_err(|_| Error::Actor("Failed to initialize actor system".into()))
}

pub async fn setup_bot(config: Config, store: TriviaStore) -> miette::Result<()> {
    info!("Setting up Discord bot");

    let Config {
        discord_token,
        bot_activity,
        game,
        ..
    } = config;

    let options = poise::FrameworkOptions {
        commands: vec![
            trivia_start(),
            trivia_stop(),
            skip(),
            trivia_alias_add(),
            trivia_alias_remove(),
            trivia_alias_list(),
            hof(),
            stats(),
        ],
        prefix_options: poise::PrefixFrameworkOptions {
            prefix: Some("!".into()),
            ..Default::default()
        },
        event_handler: |ctx, event, framework, data| {
            Box::pin(event_handler(ctx, event, framework, data))
        },
        ..Default::default()
    };

    let framework = poise::Framework::builder()
        .options(options)
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands)
                    .await
                    .map_err(Error::Discord)?;

                info!("{} is connected!", ready.user.name);
                ctx.set_presence(
                    Some(serenity::ActivityData::playing(&bot_activity)),
                    serenity::OnlineStatus::Online,
                );

                let (arbiter, announcer) = spawn_actor_system(ctx.http.clone()).await?;
                let registry = SessionRegistry::new(store, game, announcer.recipient(), arbiter);

                info!("Trivia sessions ready");
                Ok(Data { registry })
            })
        })
        .build();

    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(discord_token, intents)
        .framework(framework)
        .await
        .map_err(Error::Discord)?;

    info!("Starting bot...");
    client.start().await.map_err(Error::Discord)?;

    Ok(())
}
