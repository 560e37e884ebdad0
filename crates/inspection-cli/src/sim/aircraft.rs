//! Simulated aircraft.
//!
//! Implements both link traits so the mission supervisor can be exercised
//! end to end without hardware. Legs are flown at the configured speed
//! (compressed by `time_scale`), photo waypoints write a JPEG into the media
//! store, and "reached" confirmations can be dropped or delivered late to
//! reproduce flaky telemetry.

use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use inspection_core::spatial::distance_3d;
use inspection_core::{AircraftPosition, GeoPoint, WaypointPlan};
use inspection_link::{
    ExecutionProgress, FlightEvent, FlightLink, LinkError, LinkMissionState, LinkOp, MediaFileRef, MediaLink,
    MediaType, Photo, PhotoContent, StorageLocation,
};
use inspection_mission::FlightEventSink;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

const TRAVEL_STEP: Duration = Duration::from_millis(250);
const MIN_RETURN_HOME_ALTITUDE_M: f64 = 20.0;
const MAX_RETURN_HOME_ALTITUDE_M: f64 = 500.0;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub speed_mps: f64,
    /// Simulated seconds per wall-clock second for legs between waypoints
    pub time_scale: f64,
    /// Time from arrival until the photo lands in the media store (not scaled)
    pub capture_delay: Duration,
    /// Hover time after the photo is stored (not scaled)
    pub photo_hold: Duration,
    /// Round-trip time of every link call
    pub command_latency: Duration,
    pub drop_reached_probability: f64,
    pub late_reached_probability: f64,
    pub late_reached_delay: Duration,
    /// Photos land on the SD card and the internal store is unavailable
    pub photos_on_sd_card: bool,
    pub thumbnail_failure_probability: f64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            speed_mps: 5.0,
            time_scale: 10.0,
            capture_delay: Duration::from_millis(2_500),
            photo_hold: Duration::from_secs(2),
            command_latency: Duration::from_millis(100),
            drop_reached_probability: 0.15,
            late_reached_probability: 0.15,
            late_reached_delay: Duration::from_millis(3_500),
            photos_on_sd_card: false,
            thumbnail_failure_probability: 0.2,
            seed: 7,
        }
    }
}

#[derive(Debug)]
struct SimState {
    loaded: Option<Arc<WaypointPlan>>,
    uploaded: bool,
    mission_state: LinkMissionState,
    target: usize,
    position: AircraftPosition,
    return_home_altitude_m: f64,
    files: Vec<(StorageLocation, MediaFileRef)>,
    photo_counter: u32,
}

pub struct SimulatedAircraft {
    me: Weak<SimulatedAircraft>,
    config: SimConfig,
    home: GeoPoint,
    state: Mutex<SimState>,
    paused: watch::Sender<bool>,
    flight_task: Mutex<Option<JoinHandle<()>>>,
    sink: OnceLock<FlightEventSink>,
    rng: Mutex<StdRng>,
}

impl SimulatedAircraft {
    pub fn new(config: SimConfig, home: GeoPoint) -> Arc<Self> {
        let rng = StdRng::seed_from_u64(config.seed);
        let (paused, _) = watch::channel(false);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            home,
            state: Mutex::new(SimState {
                loaded: None,
                uploaded: false,
                mission_state: LinkMissionState::ReadyToUpload,
                target: 0,
                position: AircraftPosition {
                    lat: home.lat,
                    lon: home.lon,
                    altitude_m: 0.0,
                },
                return_home_altitude_m: 30.0,
                files: Vec::new(),
                photo_counter: 0,
            }),
            paused,
            flight_task: Mutex::new(None),
            sink: OnceLock::new(),
            rng: Mutex::new(rng),
        })
    }

    /// Connect the event stream. Only the first sink is kept.
    pub fn attach(&self, sink: FlightEventSink) {
        if self.sink.set(sink).is_err() {
            tracing::warn!("Simulated aircraft already attached, ignoring new sink");
        }
    }

    /// Report the home point, as the aircraft does after GPS lock.
    pub fn announce_home(&self) {
        self.emit(FlightEvent::HomeLocation(self.home));
    }

    pub fn mission_state(&self) -> LinkMissionState {
        self.with_state(|state| state.mission_state)
    }

    pub fn position(&self) -> AircraftPosition {
        self.with_state(|state| state.position)
    }

    pub fn photo_count(&self) -> usize {
        self.with_state(|state| state.files.len())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    fn roll(&self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.random_bool(probability.min(1.0))
    }

    fn emit(&self, event: FlightEvent) {
        let Some(sink) = self.sink.get() else {
            tracing::debug!(?event, "No sink attached, dropping flight event");
            return;
        };
        if let Err(err) = sink.try_send(event) {
            tracing::warn!(error = %err, "Failed to deliver flight event");
        }
    }

    fn emit_progress(&self, target: usize, reached: bool, mission_state: LinkMissionState, total: usize) {
        self.emit(FlightEvent::Execution(ExecutionProgress {
            target_waypoint_index: target,
            reached,
            state: mission_state,
            total_waypoints: total,
        }));
    }

    async fn link_call(&self) {
        if !self.config.command_latency.is_zero() {
            sleep(self.config.command_latency).await;
        }
    }

    fn replace_flight_task(&self, task: Option<JoinHandle<()>>) {
        let mut slot = self.flight_task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = std::mem::replace(&mut *slot, task) {
            previous.abort();
        }
    }

    async fn wait_while_paused(&self) {
        let mut paused = self.paused.subscribe();
        loop {
            let is_paused = *paused.borrow_and_update();
            if !is_paused {
                return;
            }
            if paused.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `duration` of wall-clock time, frozen while paused.
    async fn hold(&self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() {
            self.wait_while_paused().await;
            let step = remaining.min(TRAVEL_STEP);
            sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
    }

    async fn fly(self: Arc<Self>, plan: Arc<WaypointPlan>) {
        let total = plan.len();
        tracing::info!(waypoints = total, "Simulated mission started");

        for (index, waypoint) in plan.waypoints.iter().enumerate() {
            self.with_state(|state| state.target = index);
            self.emit_progress(index, false, LinkMissionState::Executing, total);

            let from = self.position();
            let leg_m = distance_3d(
                from.lat,
                from.lon,
                from.altitude_m,
                waypoint.lat,
                waypoint.lon,
                waypoint.altitude_m,
            );
            let leg_s = leg_m / self.config.speed_mps.max(0.1) / self.config.time_scale.max(0.01);
            self.hold(Duration::from_secs_f64(leg_s)).await;

            let position = AircraftPosition {
                lat: waypoint.lat,
                lon: waypoint.lon,
                altitude_m: waypoint.altitude_m,
            };
            self.with_state(|state| state.position = position);
            self.emit(FlightEvent::Position(position));

            if waypoint.is_photo_capture {
                self.confirm_arrival(index, total);
                // Camera actions complete even if the mission is paused meanwhile
                sleep(self.config.capture_delay).await;
                self.capture_photo();
                self.hold(self.config.photo_hold).await;
            } else {
                self.emit_progress(index, true, LinkMissionState::Executing, total);
            }
            self.wait_while_paused().await;
        }

        self.with_state(|state| {
            state.mission_state = LinkMissionState::ReadyToUpload;
            state.uploaded = false;
        });
        tracing::info!("Simulated mission finished");
        self.emit(FlightEvent::Finished { error: None });
    }

    fn confirm_arrival(&self, index: usize, total: usize) {
        if self.roll(self.config.drop_reached_probability) {
            tracing::debug!(waypoint = index, "Dropping reached confirmation");
            return;
        }
        if !self.roll(self.config.late_reached_probability) {
            self.emit_progress(index, true, LinkMissionState::Executing, total);
            return;
        }

        tracing::debug!(waypoint = index, delay = ?self.config.late_reached_delay, "Delaying reached confirmation");
        let Some(me) = self.me.upgrade() else {
            return;
        };
        let delay = self.config.late_reached_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            let mission_state = me.mission_state();
            me.emit_progress(index, true, mission_state, total);
        });
    }

    fn capture_photo(&self) {
        let location = if self.config.photos_on_sd_card {
            StorageLocation::SdCard
        } else {
            StorageLocation::InternalStorage
        };
        self.with_state(|state| {
            state.photo_counter += 1;
            let file = MediaFileRef {
                file_name: format!("DJI_{:04}.JPG", state.photo_counter),
                created_at: Utc::now(),
                media_type: MediaType::Jpeg,
                size_bytes: 6_291_456,
            };
            tracing::debug!(file = %file.file_name, ?location, "Photo captured");
            state.files.push((location, file));
        });
    }

    fn photo(file: &MediaFileRef, content: PhotoContent) -> Photo {
        let size = match content {
            PhotoContent::Thumbnail => 64,
            PhotoContent::Preview => 256,
        };
        let mut bytes = vec![0u8; size];
        bytes[..2].copy_from_slice(&[0xFF, 0xD8]);
        Photo {
            file_name: file.file_name.clone(),
            created_at: file.created_at,
            content,
            bytes,
        }
    }
}

#[async_trait]
impl FlightLink for SimulatedAircraft {
    async fn load_mission(&self, plan: &WaypointPlan) -> Result<(), LinkError> {
        self.link_call().await;
        self.with_state(|state| match state.mission_state {
            LinkMissionState::Executing | LinkMissionState::ExecutionPaused => {
                Err(LinkError::rejected(LinkOp::LoadMission, "mission in progress"))
            }
            _ if plan.is_empty() => Err(LinkError::rejected(LinkOp::LoadMission, "empty mission")),
            _ => {
                state.loaded = Some(Arc::new(plan.clone()));
                state.uploaded = false;
                state.mission_state = LinkMissionState::ReadyToUpload;
                Ok(())
            }
        })
    }

    async fn upload_mission(&self) -> Result<(), LinkError> {
        self.link_call().await;
        self.with_state(|state| {
            if state.loaded.is_none() {
                return Err(LinkError::rejected(LinkOp::UploadMission, "no mission loaded"));
            }
            state.uploaded = true;
            state.mission_state = LinkMissionState::ReadyToExecute;
            Ok(())
        })
    }

    async fn start_mission(&self) -> Result<(), LinkError> {
        self.link_call().await;
        let plan = self.with_state(|state| {
            if !state.uploaded || state.mission_state != LinkMissionState::ReadyToExecute {
                return Err(LinkError::rejected(LinkOp::StartMission, "mission not uploaded"));
            }
            state.mission_state = LinkMissionState::Executing;
            state.target = 0;
            state
                .loaded
                .clone()
                .ok_or_else(|| LinkError::rejected(LinkOp::StartMission, "no mission loaded"))
        })?;

        let me = self.me.upgrade().ok_or(LinkError::Unavailable {
            op: LinkOp::StartMission,
        })?;
        self.paused.send_replace(false);
        self.replace_flight_task(Some(tokio::spawn(me.fly(plan))));
        Ok(())
    }

    async fn pause_mission(&self) -> Result<(), LinkError> {
        self.link_call().await;
        let (target, total) = self.with_state(|state| {
            if state.mission_state != LinkMissionState::Executing {
                return Err(LinkError::rejected(LinkOp::PauseMission, "mission not executing"));
            }
            state.mission_state = LinkMissionState::ExecutionPaused;
            Ok((state.target, state.loaded.as_ref().map_or(0, |plan| plan.len())))
        })?;
        self.paused.send_replace(true);
        self.emit_progress(target, false, LinkMissionState::ExecutionPaused, total);
        Ok(())
    }

    async fn resume_mission(&self) -> Result<(), LinkError> {
        self.link_call().await;
        self.with_state(|state| {
            if state.mission_state != LinkMissionState::ExecutionPaused {
                return Err(LinkError::rejected(LinkOp::ResumeMission, "mission not paused"));
            }
            state.mission_state = LinkMissionState::Executing;
            Ok(())
        })?;
        self.paused.send_replace(false);
        Ok(())
    }

    async fn stop_mission(&self) -> Result<(), LinkError> {
        self.link_call().await;
        let was_running = self.with_state(|state| {
            let running = matches!(
                state.mission_state,
                LinkMissionState::Executing | LinkMissionState::ExecutionPaused
            );
            state.mission_state = LinkMissionState::ReadyToUpload;
            state.uploaded = false;
            running
        });
        self.replace_flight_task(None);
        self.paused.send_replace(false);
        if was_running {
            self.emit(FlightEvent::Finished { error: None });
        }
        Ok(())
    }

    async fn set_return_home_altitude(&self, altitude_m: f64) -> Result<(), LinkError> {
        self.link_call().await;
        if !(MIN_RETURN_HOME_ALTITUDE_M..=MAX_RETURN_HOME_ALTITUDE_M).contains(&altitude_m) {
            return Err(LinkError::rejected(
                LinkOp::SetReturnHomeAltitude,
                format!("{altitude_m} m outside {MIN_RETURN_HOME_ALTITUDE_M}-{MAX_RETURN_HOME_ALTITUDE_M} m"),
            ));
        }
        self.with_state(|state| state.return_home_altitude_m = altitude_m);
        Ok(())
    }

    async fn start_go_home(&self) -> Result<(), LinkError> {
        self.link_call().await;
        let me = self.me.upgrade().ok_or(LinkError::Unavailable { op: LinkOp::StartGoHome })?;
        self.with_state(|state| state.mission_state = LinkMissionState::Unknown);
        self.paused.send_replace(false);

        let task = tokio::spawn(async move {
            let from = me.position();
            let altitude = me.with_state(|state| state.return_home_altitude_m);
            let leg_m = distance_3d(from.lat, from.lon, altitude, me.home.lat, me.home.lon, altitude);
            me.hold(Duration::from_secs_f64(
                leg_m / me.config.speed_mps.max(0.1) / me.config.time_scale.max(0.01),
            ))
            .await;
            let landed = AircraftPosition {
                lat: me.home.lat,
                lon: me.home.lon,
                altitude_m: 0.0,
            };
            me.with_state(|state| {
                state.position = landed;
                state.mission_state = LinkMissionState::ReadyToUpload;
            });
            me.emit(FlightEvent::Position(landed));
            tracing::info!("Simulated aircraft landed at home");
        });
        self.replace_flight_task(Some(task));
        Ok(())
    }
}

#[async_trait]
impl MediaLink for SimulatedAircraft {
    async fn refresh_file_list(&self, location: StorageLocation) -> Result<(), LinkError> {
        self.link_call().await;
        if self.config.photos_on_sd_card && location == StorageLocation::InternalStorage {
            return Err(LinkError::rejected(LinkOp::RefreshFileList, "internal storage unavailable"));
        }
        Ok(())
    }

    fn list_files(&self, location: StorageLocation) -> Vec<MediaFileRef> {
        self.with_state(|state| {
            state
                .files
                .iter()
                .filter(|(stored, _)| *stored == location)
                .map(|(_, file)| file.clone())
                .collect()
        })
    }

    async fn fetch_thumbnail(&self, file: &MediaFileRef) -> Result<Photo, LinkError> {
        self.link_call().await;
        if self.roll(self.config.thumbnail_failure_probability) {
            return Err(LinkError::Timeout {
                op: LinkOp::FetchThumbnail,
            });
        }
        Ok(Self::photo(file, PhotoContent::Thumbnail))
    }

    async fn fetch_preview(&self, file: &MediaFileRef) -> Result<Photo, LinkError> {
        self.link_call().await;
        Ok(Self::photo(file, PhotoContent::Preview))
    }
}
