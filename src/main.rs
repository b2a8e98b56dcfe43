use std::env;

use log::{error, info, warn};
use parley_collab::{Collab, Credentials, MemoryDatabase, NewPlainUser, RoomCategory, UserRole};
use parley_impls::GeminiResponder;

mod logging;

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Bootstraps a parley instance against the in-memory store and walks the
/// core flows end to end: account creation, login, rooms, messages,
/// mentions, and (when a key is configured) a live Gemini turn.
#[tokio::main]
async fn main() {
    logging::init_logger();

    if let Err(e) = run().await {
        error!("Self-check failed: {e}");
        std::process::exit(1);
    }

    info!("All checks passed");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let collab = Collab::new(MemoryDatabase::new(), GeminiResponder::new());

    // Seed the admin account, create-or-promote
    let admin_username =
        env::var("PARLEY_ADMIN_USERNAME").unwrap_or_else(|_| DEFAULT_ADMIN_USERNAME.to_string());
    let admin_password =
        env::var("PARLEY_ADMIN_PASSWORD").unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string());

    let admin = collab.auth.ensure_admin(&admin_username, &admin_password).await?;
    info!("Admin account {} ready", admin.username);

    // Apply the system-wide fallback key if one is configured
    let global_key = env::var("PARLEY_GLOBAL_API_KEY").ok();
    if let Some(key) = &global_key {
        collab.set_system_api_key(&admin, key).await?;
        info!("Global API key configured");
    }

    // Account logic
    let user = collab
        .auth
        .register(NewPlainUser {
            username: "testuser".to_string(),
            password: "password123".to_string(),
            role: UserRole::User,
        })
        .await?;
    info!("User created");

    if collab
        .auth
        .register(NewPlainUser {
            username: "testuser".to_string(),
            password: "password123".to_string(),
            role: UserRole::User,
        })
        .await
        .is_ok()
    {
        return Err("duplicate username was not rejected".into());
    }
    info!("Duplicate user prevented");

    let user = collab
        .auth
        .login(Credentials {
            username: user.username.clone(),
            password: "password123".to_string(),
        })
        .await?;
    info!("Login successful");

    if collab
        .auth
        .login(Credentials {
            username: user.username.clone(),
            password: "wrongpass".to_string(),
        })
        .await
        .is_ok()
    {
        return Err("invalid login was accepted".into());
    }
    info!("Invalid login handled");

    // Rooms, messages, mentions
    let room = collab
        .rooms
        .create_room(&user, RoomCategory::Study, "Math Help")
        .await?;
    info!("Room created (id: {})", room.id);

    collab
        .send_message(&user, room.id, &format!("Hello @{}", admin.username), false)
        .await?;
    info!("Message saved");

    let unread = collab.auth.unread_rooms(admin.id).await?;
    if unread != vec![room.id] {
        return Err("mention did not mark the room unread".into());
    }

    let view = collab.open_room(&admin, room.id).await?;
    if view.messages.len() != 1 {
        return Err("message was not retrieved".into());
    }
    if !collab.auth.unread_rooms(admin.id).await?.is_empty() {
        return Err("opening the room did not clear the mention".into());
    }
    info!("Mention round-trip verified");

    // Live AI turn, only when explicitly configured
    if global_key.is_some() {
        let outcome = collab
            .send_message(&admin, room.id, "@gemini say hello in one sentence", false)
            .await?;

        match (outcome.ai_reply, outcome.ai_error) {
            (Some(reply), _) => info!("Gemini replied: {}", reply.content),
            (None, Some(e)) => warn!("Gemini call failed: {e}"),
            (None, None) => return Err("AI trigger did not fire".into()),
        }
    } else {
        info!("PARLEY_GLOBAL_API_KEY not set, skipping live Gemini check");
    }

    Ok(())
}
