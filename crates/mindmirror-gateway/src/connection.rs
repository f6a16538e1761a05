use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use mindmirror_db::Database;
use mindmirror_types::events::{GatewayCommand, GatewayEvent};
use mindmirror_types::models::UserProfile;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Journals this connection receives `EntryCreate` events for, shared between
/// the send and recv tasks.
type Subscriptions = Arc<std::sync::RwLock<HashSet<Uuid>>>;

/// Handle a pre-authenticated WebSocket connection. The JWT was already
/// validated at the HTTP upgrade layer and the profile resolved, so we go
/// straight to Ready + event loop.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    user: UserProfile,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} ({}) connected to gateway", user.name, user.id);

    // Send Ready event
    let ready = GatewayEvent::Ready { user: user.clone() };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    let mut broadcast_rx = dispatcher.subscribe();

    // Everyone watches their own journal from the moment they connect;
    // doctors add patient journals on demand.
    let subscriptions: Subscriptions = Arc::new(std::sync::RwLock::new(HashSet::from([user.id])));
    let send_subscriptions = subscriptions.clone();

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts -> client, with heartbeat
    let send_user = user.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let deliver = {
                        let subs = send_subscriptions.read()
                            .expect("subscription lock poisoned");
                        should_deliver(&event, &send_user, &subs)
                    };
                    if !deliver {
                        continue;
                    }

                    // A cleared link also ends this doctor's live view of
                    // that journal.
                    if let GatewayEvent::LinkCleared { patient_id, .. } = &event {
                        let mut subs = send_subscriptions.write()
                            .expect("subscription lock poisoned");
                        subs.remove(patient_id);
                    }

                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_user = user.clone();
    let recv_subscriptions = subscriptions.clone();
    let recv_db = db.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    match serde_json::from_str::<GatewayCommand>(&text) {
                        Ok(cmd) => {
                            handle_command(&recv_db, &recv_user, cmd, &recv_subscriptions).await;
                        }
                        Err(e) => {
                            warn!(
                                "{} ({}) bad command: {} -- raw: {}",
                                recv_user.name,
                                recv_user.id,
                                e,
                                &text[..text.len().min(200)]
                            );
                        }
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} ({}) disconnected from gateway", user.name, user.id);
}

/// Routing rule for one connection: entry events follow the subscription set,
/// link events follow the doctor's own code, and Ready is never rebroadcast.
fn should_deliver(event: &GatewayEvent, user: &UserProfile, subscribed: &HashSet<Uuid>) -> bool {
    match event {
        GatewayEvent::Ready { .. } => false,
        GatewayEvent::EntryCreate { entry } => subscribed.contains(&entry.owner_id),
        GatewayEvent::LinkSet { doctor_code, .. }
        | GatewayEvent::LinkCleared { doctor_code, .. } => {
            user.role.doctor_code() == Some(doctor_code.as_str())
        }
    }
}

async fn handle_command(
    db: &Arc<Database>,
    user: &UserProfile,
    cmd: GatewayCommand,
    subscriptions: &Subscriptions,
) {
    match cmd {
        GatewayCommand::SubscribeEntries { owner_id } => {
            if !may_watch_journal(db, user, owner_id).await {
                warn!(
                    "{} ({}) denied subscription to journal {}",
                    user.name, user.id, owner_id
                );
                return;
            }
            info!("{} ({}) subscribing to journal {}", user.name, user.id, owner_id);
            subscriptions
                .write()
                .expect("subscription lock poisoned")
                .insert(owner_id);
        }

        GatewayCommand::UnsubscribeEntries { owner_id } => {
            subscriptions
                .write()
                .expect("subscription lock poisoned")
                .remove(&owner_id);
        }
    }
}

/// Patients may watch their own journal; a doctor may watch a patient who is
/// currently linked to their code. Everything else is denied.
async fn may_watch_journal(db: &Arc<Database>, user: &UserProfile, owner_id: Uuid) -> bool {
    if owner_id == user.id {
        return true;
    }
    let Some(code) = user.role.doctor_code().map(str::to_owned) else {
        return false;
    };

    let db = Arc::clone(db);
    let result =
        tokio::task::spawn_blocking(move || db.get_profile(&owner_id.to_string())).await;
    match result {
        Ok(Ok(Some(profile))) => profile.linked_doctor_code.as_deref() == Some(code.as_str()),
        Ok(Ok(None)) => false,
        Ok(Err(e)) => {
            warn!("Journal authorization lookup failed: {}", e);
            false
        }
        Err(e) => {
            warn!("Journal authorization task failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mindmirror_types::models::{ActivityRef, MoodEntry, RoleFields};

    fn patient(id: Uuid) -> UserProfile {
        UserProfile {
            id,
            email: "pat@example.com".into(),
            name: "Sam".into(),
            role: RoleFields::Patient {
                linked_doctor_code: Some("DR7QX2KP".into()),
            },
            created_at: Utc::now(),
        }
    }

    fn doctor(code: &str) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            email: "doc@example.com".into(),
            name: "Dr. Chen".into(),
            role: RoleFields::Doctor {
                doctor_code: code.into(),
            },
            created_at: Utc::now(),
        }
    }

    fn entry(owner_id: Uuid) -> GatewayEvent {
        GatewayEvent::EntryCreate {
            entry: MoodEntry {
                id: Uuid::new_v4(),
                owner_id,
                mood_words: vec!["Content".into()],
                activities: vec![ActivityRef {
                    id: "resting".into(),
                    name: "Resting".into(),
                    is_custom: false,
                }],
                notes: None,
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn entry_events_follow_the_subscription_set() {
        let me = Uuid::new_v4();
        let someone_else = Uuid::new_v4();
        let user = patient(me);
        let subs = HashSet::from([me]);

        assert!(should_deliver(&entry(me), &user, &subs));
        assert!(!should_deliver(&entry(someone_else), &user, &subs));
    }

    #[test]
    fn doctors_see_entries_of_subscribed_patients() {
        let patient_id = Uuid::new_v4();
        let user = doctor("DR7QX2KP");
        let mut subs = HashSet::from([user.id]);

        assert!(!should_deliver(&entry(patient_id), &user, &subs));
        subs.insert(patient_id);
        assert!(should_deliver(&entry(patient_id), &user, &subs));
    }

    #[test]
    fn link_events_go_to_the_matching_doctor_only() {
        let event = GatewayEvent::LinkSet {
            patient: patient(Uuid::new_v4()),
            doctor_code: "DR7QX2KP".into(),
        };
        let subs = HashSet::new();

        assert!(should_deliver(&event, &doctor("DR7QX2KP"), &subs));
        assert!(!should_deliver(&event, &doctor("DR000000"), &subs));
        // Patients never receive roster events, even their own.
        assert!(!should_deliver(&event, &patient(Uuid::new_v4()), &subs));
    }

    #[test]
    fn ready_is_never_rebroadcast() {
        let user = patient(Uuid::new_v4());
        let event = GatewayEvent::Ready { user: user.clone() };
        assert!(!should_deliver(&event, &user, &HashSet::from([user.id])));
    }
}
