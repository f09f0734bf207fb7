//! gRPC server implementation for GameEngineService.
//!
//! One room holds one game. Every input for a room goes through the room's
//! lock, so two requests never interleave their board mutations. Combat
//! pacing runs on a tokio timer that only holds a weak reference to the room
//! and is aborted once the game is over or the room is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use crate::engine::delivery::{ChannelHub, Delivery};
use crate::engine::error::GameError;
use crate::engine::models::{self, Outbound, RoomId};
use crate::games::zoondo::catalog::TribeCatalog;
use crate::games::zoondo::combat::CornerOutcome;
use crate::games::zoondo::game::{Game, GameContext};

pub mod proto {
    tonic::include_proto!("zoondo.game_engine.v1");
}

use proto::game_engine_service_server::GameEngineService;
use proto::*;

struct RoomState {
    game: Game,
    combat_timer: Option<AbortHandle>,
}

impl RoomState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.combat_timer.take() {
            timer.abort();
        }
    }

    /// Release the pacing timer once nothing is left to resume.
    fn settle(&mut self) {
        if self.game.is_over() {
            self.cancel_timer();
        }
    }
}

struct Room {
    id: RoomId,
    hub: Arc<ChannelHub>,
    state: tokio::sync::Mutex<RoomState>,
}

impl Drop for Room {
    fn drop(&mut self) {
        self.state.get_mut().cancel_timer();
    }
}

/// Drain the stack once the post-combat pause is over.
fn schedule_resume(room: &Arc<Room>, state: &mut RoomState, delay: Duration) {
    state.cancel_timer();
    let weak: Weak<Room> = Arc::downgrade(room);
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(room) = weak.upgrade() else {
            return;
        };
        let mut state = room.state.lock().await;
        state.combat_timer = None;
        if state.game.resume_stack() {
            tracing::debug!(room = %room.id, "resumed after combat");
        }
        state.settle();
    });
    state.combat_timer = Some(task.abort_handle());
}

/// The gRPC service implementation.
pub struct GameEngineServer {
    context: GameContext,
    catalog: Arc<TribeCatalog>,
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
}

impl GameEngineServer {
    pub fn new(context: GameContext, catalog: Arc<TribeCatalog>) -> Self {
        Self {
            context,
            catalog,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn room(&self, room_id: &str) -> Result<Arc<Room>, Status> {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("unknown room: {}", room_id)))
    }

    fn close_room(&self, room_id: &str) {
        if self
            .rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(room_id)
            .is_some()
        {
            tracing::info!(room = room_id, "room closed");
        }
    }

    /// Run one input against a room's game under the room lock.
    async fn with_game<T>(
        &self,
        room_id: &str,
        op: impl FnOnce(&mut Game) -> Result<T, GameError>,
    ) -> Result<T, Status> {
        let room = self.room(room_id)?;
        let mut state = room.state.lock().await;
        let result = op(&mut state.game);
        state.settle();
        result.map_err(game_status)
    }
}

// --- Conversion helpers: protobuf <-> engine types ---

fn proto_to_player(player: Option<Player>) -> Result<models::Player, Status> {
    let p = player.ok_or_else(|| Status::invalid_argument("player is required"))?;
    if p.player_id.is_empty() {
        return Err(Status::invalid_argument("player_id is required"));
    }
    Ok(models::Player::new(&p.player_id, &p.display_name, &p.tribe))
}

fn proto_to_position(position: Option<Position>, field: &str) -> Result<models::Position, Status> {
    position
        .map(|p| models::Position::new(p.x, p.y))
        .ok_or_else(|| Status::invalid_argument(format!("{} is required", field)))
}

fn position_to_proto(position: models::Position) -> Position {
    Position {
        x: position.x,
        y: position.y,
    }
}

fn outbound_to_event(item: Outbound) -> Result<ServerEvent, Status> {
    let (kind, payload) = match item {
        Outbound::State(state) => ("state", serde_json::to_vec(&state)),
        Outbound::Message(message) => ("message", serde_json::to_vec(&message)),
    };
    let payload_json =
        payload.map_err(|e| Status::internal(format!("failed to encode event: {}", e)))?;
    Ok(ServerEvent {
        kind: kind.to_string(),
        payload_json,
    })
}

fn game_status(error: GameError) -> Status {
    let message = error.to_string();
    match error {
        GameError::NotParticipant(_) | GameError::NotActivePlayer(_) | GameError::NotPrompted(_) => {
            Status::permission_denied(message)
        }
        GameError::AlreadyJoined(_) => Status::already_exists(message),
        GameError::UnknownTribe(_) | GameError::UnknownCard(_) => Status::not_found(message),
        GameError::IllegalMove { .. }
        | GameError::NoCardAt(_)
        | GameError::NotYourCard(_)
        | GameError::InvalidCorner(_)
        | GameError::InvalidSelection(_) => Status::invalid_argument(message),
        GameError::WrongPhase { .. }
        | GameError::CornerAlreadyChosen(_)
        | GameError::GameFull
        | GameError::GameOver
        | GameError::InvalidDisposition { .. } => Status::failed_precondition(message),
    }
}

#[tonic::async_trait]
impl GameEngineService for GameEngineServer {
    async fn list_tribes(
        &self,
        _request: Request<ListTribesRequest>,
    ) -> Result<Response<ListTribesResponse>, Status> {
        let tribes = self
            .catalog
            .tribes
            .iter()
            .map(|(id, tribe)| TribeInfo {
                tribe_id: id.clone(),
                display_name: tribe.name.clone(),
            })
            .collect();
        Ok(Response::new(ListTribesResponse { tribes }))
    }

    async fn create_game(
        &self,
        request: Request<CreateGameRequest>,
    ) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let player = proto_to_player(req.player)?;
        if req.room_id.is_empty() {
            return Err(Status::invalid_argument("room_id is required"));
        }

        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if rooms.contains_key(&req.room_id) {
            return Err(Status::already_exists(format!("room {} already exists", req.room_id)));
        }
        let hub = Arc::new(ChannelHub::new());
        let delivery: Arc<dyn Delivery> = hub.clone();
        let game = Game::create(&self.context, &req.room_id, player, delivery).map_err(game_status)?;
        rooms.insert(
            req.room_id.clone(),
            Arc::new(Room {
                id: req.room_id.clone(),
                hub,
                state: tokio::sync::Mutex::new(RoomState {
                    game,
                    combat_timer: None,
                }),
            }),
        );
        tracing::info!(room = %req.room_id, rooms = rooms.len(), "room opened");
        Ok(Response::new(Ack {}))
    }

    async fn join_game(&self, request: Request<JoinGameRequest>) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let player = proto_to_player(req.player)?;
        self.with_game(&req.room_id, |game| game.join(player)).await?;
        Ok(Response::new(Ack {}))
    }

    async fn leave_game(&self, request: Request<LeaveGameRequest>) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let room = self.room(&req.room_id)?;
        let over = {
            let mut state = room.state.lock().await;
            state.game.leave(&req.player_id).map_err(game_status)?;
            state.settle();
            state.game.is_over()
        };
        room.hub.disconnect(&req.player_id);
        if over {
            self.close_room(&req.room_id);
        }
        Ok(Response::new(Ack {}))
    }

    async fn request_move(
        &self,
        request: Request<RequestMoveRequest>,
    ) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let source = proto_to_position(req.source, "source")?;
        let destination = proto_to_position(req.destination, "destination")?;
        self.with_game(&req.room_id, |game| {
            game.request_move(&req.player_id, source, destination)
        })
        .await?;
        Ok(Response::new(Ack {}))
    }

    async fn choose_corner(
        &self,
        request: Request<ChooseCornerRequest>,
    ) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let room = self.room(&req.room_id)?;
        let mut state = room.state.lock().await;
        let outcome = state
            .game
            .choose_corner(&req.player_id, req.corner_index)
            .map_err(game_status)?;
        if let CornerOutcome::Resolved { resume_after } = outcome {
            schedule_resume(&room, &mut state, resume_after);
        }
        state.settle();
        Ok(Response::new(Ack {}))
    }

    async fn resolve_selection(
        &self,
        request: Request<ResolveSelectionRequest>,
    ) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let choice = proto_to_position(req.choice, "choice")?;
        self.with_game(&req.room_id, |game| game.resolve_selection(&req.player_id, choice))
            .await?;
        Ok(Response::new(Ack {}))
    }

    async fn get_legal_moves(
        &self,
        request: Request<GetLegalMovesRequest>,
    ) -> Result<Response<GetLegalMovesResponse>, Status> {
        let req = request.into_inner();
        let source = proto_to_position(req.source, "source")?;
        let destinations = self
            .with_game(&req.room_id, |game| game.legal_moves(&req.player_id, source))
            .await?;
        let moves = destinations
            .into_iter()
            .map(|d| LegalMove {
                destination: Some(position_to_proto(d.position)),
                combat: d.combat,
            })
            .collect();
        Ok(Response::new(GetLegalMovesResponse { moves }))
    }

    // --- Subscribe (server streaming) ---
    type SubscribeStream = ReceiverStream<Result<ServerEvent, Status>>;

    async fn subscribe(
        &self,
        request: Request<SubscribeRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        let req = request.into_inner();
        let room = self.room(&req.room_id)?;
        let state = room.state.lock().await;
        if !state.game.is_participant(&req.player_id) {
            return Err(game_status(GameError::NotParticipant(req.player_id)));
        }

        let mut inbox = room.hub.connect(&req.player_id);
        let (tx, rx) = mpsc::channel(32);
        let player_id = req.player_id.clone();
        tokio::spawn(async move {
            while let Some(item) = inbox.recv().await {
                if tx.send(outbound_to_event(item)).await.is_err() {
                    tracing::debug!(player = %player_id, "subscriber went away");
                    break;
                }
            }
        });

        state.game.send_state_to(&req.player_id);
        tracing::info!(room = %req.room_id, player = %req.player_id, "player subscribed");
        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::EngineSettings;
    use crate::engine::plugin::PowerRegistry;
    use crate::games::zoondo::catalog::OffsetGeometry;
    use crate::games::zoondo::testing::*;
    use crate::games::zoondo::types::CombatStep;
    use tokio_stream::StreamExt;

    fn server(settings: EngineSettings) -> GameEngineServer {
        let catalog = Arc::new(
            TribeCatalog::from_toml_str(include_str!("../data/tribes.toml")).unwrap(),
        );
        let context = GameContext {
            geometry: Arc::new(OffsetGeometry::new(settings.board_size)),
            settings,
            catalog: catalog.clone(),
            powers: Arc::new(PowerRegistry::from_catalog(&catalog)),
        };
        GameEngineServer::new(context, catalog)
    }

    fn player(id: &str, name: &str, tribe: &str) -> Option<Player> {
        Some(Player {
            player_id: id.into(),
            display_name: name.into(),
            tribe: tribe.into(),
        })
    }

    async fn open_room(server: &GameEngineServer) {
        server
            .create_game(Request::new(CreateGameRequest {
                room_id: "r1".into(),
                player: player("p1", "Alice", "reef"),
            }))
            .await
            .unwrap();
        server
            .join_game(Request::new(JoinGameRequest {
                room_id: "r1".into(),
                player: player("p2", "Bob", "savanna"),
            }))
            .await
            .unwrap();
    }

    /// A room whose game has a resolved combat waiting to be resumed.
    fn resolved_combat_room(settings: EngineSettings) -> Arc<Room> {
        let (mut game, _recorder) = arena_game_with(
            settings,
            &[
                ("p1", "alpha", "scout", 1, 1),
                ("p2", "beta", "wall", 1, 2),
                ("p1", "alpha", "totem", 0, 0),
                ("p2", "beta", "idol", 5, 5),
            ],
        );
        force_turn(&mut game, "p1");
        game.request_move("p1", models::Position::new(1, 1), models::Position::new(1, 2))
            .unwrap();
        game.choose_corner("p1", 0).unwrap();
        game.choose_corner("p2", 0).unwrap();
        Arc::new(Room {
            id: "arena".into(),
            hub: Arc::new(ChannelHub::new()),
            state: tokio::sync::Mutex::new(RoomState {
                game,
                combat_timer: None,
            }),
        })
    }

    #[tokio::test]
    async fn test_list_tribes() {
        let server = server(test_settings());
        let response = server
            .list_tribes(Request::new(ListTribesRequest {}))
            .await
            .unwrap()
            .into_inner();
        let ids: Vec<_> = response.tribes.iter().map(|t| t.tribe_id.as_str()).collect();
        assert_eq!(ids, vec!["reef", "savanna"]);
    }

    #[tokio::test]
    async fn test_room_lifecycle_and_status_mapping() {
        let server = server(test_settings());
        open_room(&server).await;
        assert_eq!(server.room_count(), 1);

        let duplicate = server
            .create_game(Request::new(CreateGameRequest {
                room_id: "r1".into(),
                player: player("p3", "Eve", "reef"),
            }))
            .await
            .unwrap_err();
        assert_eq!(duplicate.code(), tonic::Code::AlreadyExists);

        let full = server
            .join_game(Request::new(JoinGameRequest {
                room_id: "r1".into(),
                player: player("p3", "Eve", "reef"),
            }))
            .await
            .unwrap_err();
        assert_eq!(full.code(), tonic::Code::FailedPrecondition);

        let stranger = server
            .request_move(Request::new(RequestMoveRequest {
                room_id: "r1".into(),
                player_id: "p3".into(),
                source: Some(Position { x: 0, y: 0 }),
                destination: Some(Position { x: 0, y: 1 }),
            }))
            .await
            .unwrap_err();
        assert_eq!(stranger.code(), tonic::Code::PermissionDenied);

        let missing = server
            .choose_corner(Request::new(ChooseCornerRequest {
                room_id: "nope".into(),
                player_id: "p1".into(),
                corner_index: 0,
            }))
            .await
            .unwrap_err();
        assert_eq!(missing.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn test_subscribe_pushes_current_view() {
        let server = server(test_settings());
        open_room(&server).await;

        let mut stream = server
            .subscribe(Request::new(SubscribeRequest {
                room_id: "r1".into(),
                player_id: "p1".into(),
            }))
            .await
            .unwrap()
            .into_inner();

        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.kind, "state");
        let view: serde_json::Value = serde_json::from_slice(&event.payload_json).unwrap();
        assert_eq!(view["player"]["player_id"], "p1");
        assert_eq!(view["turn"]["phase"], "main");

        let outsider = server
            .subscribe(Request::new(SubscribeRequest {
                room_id: "r1".into(),
                player_id: "p9".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(outsider.code(), tonic::Code::PermissionDenied);
    }

    #[tokio::test]
    async fn test_forfeit_closes_the_room() {
        let mut settings = test_settings();
        settings.forfeit_on_leave = true;
        let server = server(settings);
        open_room(&server).await;

        server
            .leave_game(Request::new(LeaveGameRequest {
                room_id: "r1".into(),
                player_id: "p2".into(),
            }))
            .await
            .unwrap();
        assert_eq!(server.room_count(), 0);
    }

    #[tokio::test]
    async fn test_combat_timer_resumes_the_stack() {
        let room = resolved_combat_room(test_settings());
        {
            let mut state = room.state.lock().await;
            assert_eq!(
                state.game.turn().combat.as_ref().map(|c| c.step),
                Some(CombatStep::Resolve)
            );
            schedule_resume(&room, &mut state, Duration::from_millis(10));
        }

        tokio::time::sleep(Duration::from_millis(200)).await;

        let state = room.state.lock().await;
        assert!(state.combat_timer.is_none());
        assert_eq!(state.game.turn().active_player.as_deref(), Some("p2"));
        assert!(state.game.turn().combat.is_none());
    }

    #[tokio::test]
    async fn test_game_over_cancels_the_timer() {
        let mut settings = test_settings();
        settings.forfeit_on_leave = true;
        let room = resolved_combat_room(settings);
        let mut state = room.state.lock().await;
        schedule_resume(&room, &mut state, Duration::from_secs(60));
        assert!(state.combat_timer.is_some());

        state.game.leave("p2").unwrap();
        state.settle();

        assert!(state.game.is_over());
        assert!(state.combat_timer.is_none());
    }
}
