use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{info, warn};

use fleet_common::{
    ButtonTracker, FeedbackPulse, MenuState, NodeId, NodeRegistry, NodeRotation, RegistryError,
    RegistryFile, RuntimeConfig, Screen, Station, SyncTarget, TelemetryUpdate, UiAction, UiEngine,
    RELAY_COUNT, TOPIC_RELAY_CMD, TOPIC_STATUS,
};

use crate::{
    hw::{
        clock_hms, clock_string, Buzzer, ButtonSource, Clock, ConsoleDisplay, DisplayAdapter,
        HostClock, IdleButtons, LogBuzzer, LogOutputs, RelayOutputs, SimulatedTempProbe, TempProbe,
    },
    radio::{RadioService, UdpRadioLink},
    store::AppStore,
};

const MAX_BRIDGE_PAYLOAD_BYTES: usize = 512;

/// Input-loop-owned state: menu engine, button bookkeeping, feedback pulse,
/// and the data-screen rotation cursor. The display loop reads it under the
/// same lock but never writes menu state.
struct UiState {
    engine: UiEngine,
    tracker: ButtonTracker,
    pulse: FeedbackPulse,
    rotation: NodeRotation,
}

#[derive(Clone)]
struct AppState {
    station: Arc<Mutex<Station>>,
    ui: Arc<Mutex<UiState>>,
    radio: Arc<Mutex<Option<RadioService>>>,
    clock: Arc<Mutex<Box<dyn Clock>>>,
    display: Arc<Mutex<Box<dyn DisplayAdapter>>>,
    outputs: Arc<Mutex<Box<dyn RelayOutputs>>>,
    buzzer: Arc<Mutex<Box<dyn Buzzer>>>,
    temperature: Arc<Mutex<f32>>,
    mqtt_connected: Arc<AtomicBool>,
    settings: Arc<Mutex<RuntimeConfig>>,
    mqtt: AsyncClient,
    store: AppStore,
}

#[derive(Debug, Serialize)]
struct ApiResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
}

impl ApiResponse {
    fn ok() -> Self {
        Self {
            ok: true,
            msg: None,
        }
    }

    fn ok_msg(msg: &str) -> Self {
        Self {
            ok: true,
            msg: Some(msg.to_string()),
        }
    }

    fn fail(msg: &str) -> Self {
        Self {
            ok: false,
            msg: Some(msg.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ConfigSaveResponse {
    ok: bool,
    #[serde(rename = "restartRequired")]
    restart_required: bool,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut settings = store.load_settings().await.unwrap_or_else(|err| {
        warn!("failed to load settings from store: {err:#}");
        RuntimeConfig::default()
    });
    settings.sanitize();

    let registry_file = store.load_registry().await.unwrap_or_else(|err| {
        warn!("failed to load registry from store: {err:#}");
        RegistryFile::default()
    });
    let registry = NodeRegistry::from_file(&registry_file);
    let mut station = Station::restore(registry, settings.relay_boot, settings.fan_threshold);

    // Actuator byte store overlays the registry-seeded slots and must be in
    // place before any radio traffic goes out.
    match store.load_slot_records().await {
        Ok(records) => station.overlay_slot_records(&records),
        Err(err) => warn!("failed to load actuator store: {err:#}"),
    }

    let mut outputs: Box<dyn RelayOutputs> = Box::new(LogOutputs);
    for (channel, on) in station.relays().into_iter().enumerate() {
        outputs.set_relay(channel, on);
    }

    let mut buzzer: Box<dyn Buzzer> = Box::new(LogBuzzer);
    let radio = match UdpRadioLink::open(&settings.radio) {
        Ok(link) => Some(RadioService::new(Box::new(link))),
        Err(err) => {
            warn!("radio init failed, running degraded: {err:#}");
            signal_init_failure(buzzer.as_mut()).await;
            None
        }
    };

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(settings.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(settings.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new("fleet-master", mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(settings.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(settings.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);
    mqtt.subscribe(TOPIC_RELAY_CMD, QoS::AtMostOnce).await?;

    let ui = UiState {
        engine: UiEngine::new(settings.controller.standby_timeout_ms),
        tracker: ButtonTracker::new(settings.controller.long_press_ms),
        pulse: FeedbackPulse::default(),
        rotation: NodeRotation::default(),
    };

    let app_state = AppState {
        station: Arc::new(Mutex::new(station)),
        ui: Arc::new(Mutex::new(ui)),
        radio: Arc::new(Mutex::new(radio)),
        clock: Arc::new(Mutex::new(Box::new(HostClock::new()) as Box<dyn Clock>)),
        display: Arc::new(Mutex::new(Box::new(ConsoleDisplay::new()) as Box<dyn DisplayAdapter>)),
        outputs: Arc::new(Mutex::new(outputs)),
        buzzer: Arc::new(Mutex::new(buzzer)),
        temperature: Arc::new(Mutex::new(0.0)),
        mqtt_connected: Arc::new(AtomicBool::new(false)),
        settings: Arc::new(Mutex::new(settings)),
        mqtt,
        store,
    };

    spawn_bridge_loop(app_state.clone(), eventloop);
    spawn_status_publish_loop(app_state.clone());
    spawn_radio_loop(app_state.clone());
    spawn_input_loop(
        app_state.clone(),
        Box::new(IdleButtons),
        Box::new(SimulatedTempProbe::new()),
    );
    spawn_display_loop(app_state.clone());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/relay", post(handle_relay))
        .route("/api/node/add", post(handle_node_add))
        .route("/api/node/remove", post(handle_node_remove))
        .route("/api/node/edit", post(handle_node_edit))
        .route("/api/node/relay", post(handle_node_relay))
        .route("/api/node/dim", post(handle_node_dim))
        .route("/api/config/save", post(handle_config_save))
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse().unwrap();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind control server at {addr}"))?;

    info!("master control surface listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

// ---- task loops ----------------------------------------------------------

/// Input loop: samples buttons on a fixed tick, runs the menu engine, ticks
/// the feedback pulse, and drives the fan from the internal temperature.
fn spawn_input_loop(
    state: AppState,
    mut buttons: Box<dyn ButtonSource>,
    mut probe: Box<dyn TempProbe>,
) {
    tokio::spawn(async move {
        let poll_ms = state.settings.lock().await.controller.input_poll_ms;
        let mut interval = tokio::time::interval(Duration::from_millis(poll_ms));
        let mut fan_was: Option<bool> = None;

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            let levels = buttons.sample();
            let clock = {
                let guard = state.clock.lock().await;
                clock_hms(&**guard)
            };

            let actions = {
                let mut ui = state.ui.lock().await;
                let events = ui.tracker.update(levels, now_ms);
                let mut actions = Vec::new();
                for event in events {
                    actions.extend(ui.engine.handle_event(event, now_ms, clock));
                }
                actions
            };
            execute_ui_actions(&state, actions).await;

            let silence = { state.ui.lock().await.pulse.tick(now_ms) };
            if silence {
                state.buzzer.lock().await.stop();
            }

            let temperature = probe.read_c();
            *state.temperature.lock().await = temperature;
            let fan_on = state.station.lock().await.update_fan(temperature);
            if fan_was != Some(fan_on) {
                state.outputs.lock().await.set_fan(fan_on);
                fan_was = Some(fan_on);
            }
        }
    });
}

/// Display loop: rebuilds the screen model every refresh and hands it to the
/// rendering adapter.
fn spawn_display_loop(state: AppState) {
    tokio::spawn(async move {
        let (refresh_ms, rotate_ms) = {
            let settings = state.settings.lock().await;
            (
                settings.controller.display_refresh_ms,
                settings.controller.node_rotate_ms,
            )
        };
        let mut interval = tokio::time::interval(Duration::from_millis(refresh_ms));

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            let clock = {
                let guard = state.clock.lock().await;
                clock_string(&**guard)
            };
            let temperature = *state.temperature.lock().await;
            let network_up = state.mqtt_connected.load(Ordering::Relaxed);
            let (ssid, broker) = {
                let settings = state.settings.lock().await;
                (
                    settings.network.wifi_ssid.clone(),
                    settings.network.mqtt_host.clone(),
                )
            };

            let screen = {
                let station = state.station.lock().await;
                let mut ui = state.ui.lock().await;
                match ui.engine.state() {
                    MenuState::Idle => {
                        if ui.engine.is_standby(now_ms) {
                            Screen::Standby { clock }
                        } else {
                            let node = ui
                                .rotation
                                .current(station.node_count(), rotate_ms, now_ms)
                                .and_then(|index| station.node_card(index));
                            Screen::Data {
                                clock,
                                temperature,
                                relays: station.relays(),
                                network_up,
                                node,
                            }
                        }
                    }
                    MenuState::Top { cursor } => Screen::MenuTop { cursor },
                    MenuState::TimeEdit {
                        hour,
                        minute,
                        second,
                        field,
                    } => Screen::TimeEdit {
                        hour,
                        minute,
                        second,
                        field,
                    },
                    MenuState::Orientation { flip_pending } => Screen::Orientation { flip_pending },
                    MenuState::NetworkInfo => Screen::NetworkInfo {
                        ssid: (!ssid.is_empty()).then_some(ssid),
                        broker,
                    },
                }
            };

            state.display.lock().await.render(&screen);
        }
    });
}

/// Radio loop: drains inbound telemetry continuously and pushes every
/// occupied slot's intent on the sync interval.
fn spawn_radio_loop(state: AppState) {
    tokio::spawn(async move {
        if state.radio.lock().await.is_none() {
            info!("radio unavailable; telemetry and periodic sync disabled");
            return;
        }

        let (poll_ms, sync_ms) = {
            let settings = state.settings.lock().await;
            (
                settings.controller.radio_poll_ms,
                settings.controller.sync_interval_ms,
            )
        };
        let mut interval = tokio::time::interval(Duration::from_millis(poll_ms));
        let mut last_sync_ms: u64 = 0;

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            let frames = {
                let mut radio = state.radio.lock().await;
                match radio.as_mut() {
                    Some(service) => service.drain_telemetry(),
                    None => Vec::new(),
                }
            };
            if !frames.is_empty() {
                let mut auto_added = false;
                {
                    let mut station = state.station.lock().await;
                    for frame in &frames {
                        match station.handle_telemetry(
                            frame.id,
                            frame.temperature,
                            frame.uptime_secs,
                            now_ms,
                        ) {
                            TelemetryUpdate::AutoAdded => {
                                info!("node {} joined via unsolicited telemetry", frame.id);
                                auto_added = true;
                            }
                            TelemetryUpdate::Dropped => {
                                warn!("telemetry from node {} dropped", frame.id);
                            }
                            TelemetryUpdate::Updated => {}
                        }
                    }
                }
                if auto_added {
                    persist_registry(&state).await;
                }
            }

            if now_ms.saturating_sub(last_sync_ms) >= sync_ms {
                last_sync_ms = now_ms;
                let targets = { state.station.lock().await.sync_targets() };
                for target in targets {
                    send_sync_command(&state, target).await;
                }
            }
        }
    });
}

/// Remote-bridge inbound: relay commands funnel into the same mutation path
/// as local input.
fn spawn_bridge_loop(state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_bridge_message(&state, message.topic, message.payload.to_vec()).await
                    {
                        warn!("bridge message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    state.mqtt_connected.store(true, Ordering::Relaxed);
                    info!("message bus connected");
                }
                Ok(_) => {}
                Err(err) => {
                    state.mqtt_connected.store(false, Ordering::Relaxed);
                    warn!("bridge poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_status_publish_loop(state: AppState) {
    tokio::spawn(async move {
        let publish_ms = state
            .settings
            .lock()
            .await
            .controller
            .status_publish_interval_ms;
        let mut interval = tokio::time::interval(Duration::from_millis(publish_ms));

        loop {
            interval.tick().await;

            let temperature = *state.temperature.lock().await;
            let payload = {
                let station = state.station.lock().await;
                serde_json::to_vec(&station.status_payload(temperature))
            };

            match payload {
                Ok(body) => {
                    if let Err(err) = state
                        .mqtt
                        .publish(TOPIC_STATUS, QoS::AtLeastOnce, false, body)
                        .await
                    {
                        warn!("status publish failed: {err}");
                    }
                }
                Err(err) => warn!("status serialization failed: {err}"),
            }
        }
    });
}

// ---- shared mutation helpers ---------------------------------------------

async fn execute_ui_actions(state: &AppState, actions: Vec<UiAction>) {
    for action in actions {
        match action {
            UiAction::ToggleRelay(channel) => toggle_relay_channel(state, channel).await,
            UiAction::Beep {
                frequency_hz,
                duration_ms,
            } => start_beep(state, frequency_hz, duration_ms).await,
            UiAction::SetClock {
                hour,
                minute,
                second,
            } => {
                state.clock.lock().await.adjust(hour, minute, second);
                info!("clock set to {hour:02}:{minute:02}:{second:02}");
            }
            UiAction::ApplyOrientation { flipped } => {
                state.display.lock().await.set_flipped(flipped);
            }
        }
    }
}

async fn toggle_relay_channel(state: &AppState, channel: usize) {
    let toggled = { state.station.lock().await.toggle_local_relay(channel) };
    match toggled {
        Ok(on) => {
            state.outputs.lock().await.set_relay(channel, on);
            start_beep(state, 2000, 80).await;
            persist_relay_boot(state).await;
        }
        Err(err) => warn!("{err}"),
    }
}

async fn set_all_relays(state: &AppState, on: bool) {
    {
        let mut station = state.station.lock().await;
        for channel in 0..RELAY_COUNT {
            let _ = station.set_local_relay(channel, on);
        }
    }
    {
        let mut outputs = state.outputs.lock().await;
        for channel in 0..RELAY_COUNT {
            outputs.set_relay(channel, on);
        }
    }
    start_beep(state, 2000, 80).await;
    persist_relay_boot(state).await;
}

async fn start_beep(state: &AppState, frequency_hz: u16, duration_ms: u64) {
    let now_ms = monotonic_ms();
    state
        .ui
        .lock()
        .await
        .pulse
        .start(frequency_hz, duration_ms, now_ms);
    state.buzzer.lock().await.start_tone(frequency_hz);
}

/// Connectivity is cleared before the frame goes out; only a later inbound
/// packet re-asserts it.
async fn send_sync_command(state: &AppState, target: SyncTarget) {
    state.station.lock().await.mark_sent(target.id);
    let mut radio = state.radio.lock().await;
    if let Some(service) = radio.as_mut() {
        if let Err(err) = service.send_command(target) {
            warn!("radio send to node {} failed: {err:#}", target.id);
        }
    }
}

async fn persist_registry(state: &AppState) {
    let file = state.station.lock().await.registry_file();
    if let Err(err) = state.store.save_registry(&file).await {
        warn!("failed to persist registry: {err:#}");
    }
}

async fn persist_slot(state: &AppState, id: NodeId) {
    let record = { state.station.lock().await.slot_record(id) };
    if let Some((index, on, dim)) = record {
        if let Err(err) = state.store.save_slot_record(index, on, dim).await {
            warn!("failed to persist slot {index}: {err:#}");
        }
    }
}

async fn persist_relay_boot(state: &AppState) {
    let relays = { state.station.lock().await.relays() };
    let snapshot = {
        let mut settings = state.settings.lock().await;
        settings.relay_boot = relays;
        settings.clone()
    };
    if let Err(err) = state.store.save_settings(&snapshot).await {
        warn!("failed to persist relay state: {err:#}");
    }
}

async fn handle_bridge_message(
    state: &AppState,
    topic: String,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_BRIDGE_PAYLOAD_BYTES {
        warn!(
            "dropping oversized bridge payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 bridge payload")?;
    if topic != TOPIC_RELAY_CMD {
        return Ok(());
    }

    match message.as_str() {
        "all_on" => set_all_relays(state, true).await,
        "all_off" => set_all_relays(state, false).await,
        other => {
            if let Ok(channel) = other.parse::<usize>() {
                if channel < RELAY_COUNT {
                    toggle_relay_channel(state, channel).await;
                }
            }
        }
    }
    info!("bridge relay command: {message}");
    Ok(())
}

async fn signal_init_failure(buzzer: &mut dyn Buzzer) {
    for _ in 0..3 {
        buzzer.start_tone(2000);
        tokio::time::sleep(Duration::from_millis(100)).await;
        buzzer.stop();
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
}

// ---- HTTP handlers -------------------------------------------------------

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let clock = {
        let guard = state.clock.lock().await;
        clock_string(&**guard)
    };
    let temperature = *state.temperature.lock().await;
    let ssid = state.settings.lock().await.network.wifi_ssid.clone();
    let radio_available = state.radio.lock().await.is_some();

    let snapshot = state
        .station
        .lock()
        .await
        .snapshot(clock, temperature, ssid, radio_available);
    Json(snapshot)
}

async fn handle_relay(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(channel) = params.get("ch") else {
        return error_response(StatusCode::BAD_REQUEST, "missing ch");
    };

    if channel == "all" {
        let driven_to = { state.station.lock().await.toggle_all_relays() };
        {
            let mut outputs = state.outputs.lock().await;
            for channel in 0..RELAY_COUNT {
                outputs.set_relay(channel, driven_to);
            }
        }
        start_beep(&state, 2000, 80).await;
        persist_relay_boot(&state).await;
        return Json(ApiResponse::ok()).into_response();
    }

    let Ok(channel) = channel.parse::<usize>() else {
        return error_response(StatusCode::BAD_REQUEST, "invalid ch");
    };
    let toggled = { state.station.lock().await.toggle_local_relay(channel) };
    match toggled {
        Ok(on) => {
            state.outputs.lock().await.set_relay(channel, on);
            start_beep(&state, 2000, 80).await;
            persist_relay_boot(&state).await;
            Json(ApiResponse::ok()).into_response()
        }
        Err(_) => error_response(StatusCode::BAD_REQUEST, "invalid ch"),
    }
}

async fn handle_node_add(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(id) = params
        .get("id")
        .and_then(|value| value.parse::<NodeId>().ok())
        .filter(|id| *id > 0)
    else {
        return error_response(StatusCode::BAD_REQUEST, "missing or invalid id");
    };

    let window_ms = state.settings.lock().await.controller.discovery_window_ms;

    // The link is held for the whole window; sends and receives on the
    // half-duplex channel stay serialized.
    let reply = {
        let mut radio = state.radio.lock().await;
        let Some(service) = radio.as_mut() else {
            return Json(ApiResponse::fail("radio unavailable")).into_response();
        };
        match service.discover(id, window_ms).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("discovery for node {id} failed: {err:#}");
                return Json(ApiResponse::fail("radio error")).into_response();
            }
        }
    };

    let Some(frame) = reply else {
        return Json(ApiResponse::fail("no response from node")).into_response();
    };

    let result = {
        let mut station = state.station.lock().await;
        station.add_discovered(
            id,
            &format!("Node {id}"),
            frame.temperature,
            frame.uptime_secs,
            monotonic_ms(),
        )
    };
    match result {
        Ok(()) => {
            persist_registry(&state).await;
            Json(ApiResponse::ok_msg("node added")).into_response()
        }
        Err(err) => Json(ApiResponse::fail(&err.to_string())).into_response(),
    }
}

async fn handle_node_remove(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(id) = params
        .get("node")
        .and_then(|value| value.parse::<NodeId>().ok())
    else {
        return error_response(StatusCode::BAD_REQUEST, "missing node");
    };

    let result = { state.station.lock().await.remove_node(id) };
    match result {
        Ok(()) => {
            persist_registry(&state).await;
            Json(ApiResponse::ok()).into_response()
        }
        Err(err) => error_response(StatusCode::NOT_FOUND, &err.to_string()),
    }
}

async fn handle_node_edit(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(id) = params
        .get("node")
        .and_then(|value| value.parse::<NodeId>().ok())
    else {
        return error_response(StatusCode::BAD_REQUEST, "missing node");
    };
    let new_id = match params.get("id") {
        Some(raw) => match raw.parse::<NodeId>() {
            Ok(value) => Some(value),
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "invalid id"),
        },
        None => None,
    };
    let new_label = params.get("name").map(|value| value.as_str());

    let result = {
        state
            .station
            .lock()
            .await
            .edit_node(id, new_id, new_label)
    };
    match result {
        Ok(()) => {
            persist_registry(&state).await;
            Json(ApiResponse::ok()).into_response()
        }
        Err(err @ RegistryError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, &err.to_string())
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn handle_node_relay(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(id) = params
        .get("node")
        .and_then(|value| value.parse::<NodeId>().ok())
    else {
        return error_response(StatusCode::BAD_REQUEST, "missing node");
    };

    let result = { state.station.lock().await.toggle_node_relay(id) };
    match result {
        Ok(target) => {
            persist_slot(&state, id).await;
            persist_registry(&state).await;
            if let Some(target) = target {
                send_sync_command(&state, target).await;
            }
            Json(ApiResponse::ok()).into_response()
        }
        Err(err) => error_response(StatusCode::NOT_FOUND, &err.to_string()),
    }
}

async fn handle_node_dim(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let (Some(id), Some(value)) = (
        params
            .get("node")
            .and_then(|value| value.parse::<NodeId>().ok()),
        params
            .get("value")
            .and_then(|value| value.parse::<i64>().ok()),
    ) else {
        return error_response(StatusCode::BAD_REQUEST, "missing params");
    };

    let result = { state.station.lock().await.set_node_dim(id, value) };
    match result {
        Ok(target) => {
            persist_slot(&state, id).await;
            send_sync_command(&state, target).await;
            Json(ApiResponse::ok()).into_response()
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn handle_config_save(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let ssid = params.get("ssid").filter(|value| !value.is_empty());
    let pass = params.get("pass").filter(|value| !value.is_empty());
    let fan = params
        .get("fan")
        .and_then(|value| value.parse::<f32>().ok());

    let restart_required = ssid.is_some();
    let snapshot = {
        let mut settings = state.settings.lock().await;
        if let Some(ssid) = ssid {
            settings.network.wifi_ssid = ssid.clone();
        }
        if let Some(pass) = pass {
            settings.network.wifi_pass = pass.clone();
        }
        if let Some(fan) = fan {
            settings.fan_threshold = fan;
        }
        settings.sanitize();
        settings.clone()
    };
    state
        .station
        .lock()
        .await
        .set_fan_threshold(snapshot.fan_threshold);

    if let Err(err) = state.store.save_settings(&snapshot).await {
        warn!("failed to persist settings: {err:#}");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to persist settings");
    }

    Json(ConfigSaveResponse {
        ok: true,
        restart_required,
    })
    .into_response()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(ApiResponse::fail(message))).into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
