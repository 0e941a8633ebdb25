use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::calculator::{compute_snapshot, StreakConfig};
use crate::config::{Config, FETCH_BACKOFF_MS};
use crate::db::StreakStore;
use crate::detector::{detect_events, EventTaxonomy};
use crate::error::{AppError, Result};
use crate::fetcher::{with_retry, FetchWindow, GameLogSource};
use crate::season::SeasonWindow;
use crate::types::{EntityKind, GameRecord, RefreshStage, ScheduledGame, StreakEvent, StreakRecord};
use crate::validation::{validate_logs, Warning};

/// Counts reported at the end of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub season: String,
    pub scheduled_games: usize,
    pub player_records: usize,
    pub team_records: usize,
    pub streaks: usize,
    pub events_written: u64,
    pub events_filtered: usize,
    pub shrunk: usize,
    pub warnings: Vec<Warning>,
}

/// Drives one fetch-validate-compute-diff-persist pass. Owns the upstream
/// source and the store for the duration of the run.
pub struct Reconciler {
    cfg: Config,
    streak_cfg: Arc<StreakConfig>,
    source: Arc<dyn GameLogSource>,
    store: Arc<dyn StreakStore>,
    backoff_ms: Vec<u64>,
}

impl Reconciler {
    pub fn new(
        cfg: Config,
        streak_cfg: StreakConfig,
        source: Arc<dyn GameLogSource>,
        store: Arc<dyn StreakStore>,
    ) -> Self {
        Self {
            cfg,
            streak_cfg: Arc::new(streak_cfg),
            source,
            store,
            backoff_ms: FETCH_BACKOFF_MS.to_vec(),
        }
    }

    #[cfg(test)]
    pub fn with_backoff(mut self, backoff_ms: Vec<u64>) -> Self {
        self.backoff_ms = backoff_ms;
        self
    }

    pub async fn run(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<RunSummary> {
        let season = SeasonWindow::containing(today);
        let window = FetchWindow::for_season(&season, self.cfg.fetch_timeout);
        let sport = self.cfg.sport.as_str();
        let batch_size = self.cfg.batch_size.max(1);

        info!(
            sport,
            season = %season.label,
            from = %window.date_from,
            to = %window.date_to,
            "Starting streak refresh",
        );

        // --- Fetch: nothing is written until every source has answered ---
        let games_today = self.fetch_scoreboard().await?;
        let players = self.fetch_logs(EntityKind::Player, &window).await?;
        let teams = self.fetch_logs(EntityKind::Team, &window).await?;

        // --- Validation gates ---
        let mut warnings = validate_logs(EntityKind::Player, &players, today, &self.cfg)?;
        warnings.extend(validate_logs(EntityKind::Team, &teams, today, &self.cfg)?);

        let mut summary = RunSummary {
            season: season.label.clone(),
            scheduled_games: games_today.len(),
            player_records: players.len(),
            team_records: teams.len(),
            warnings,
            ..RunSummary::default()
        };

        // --- Schedule stage ---
        self.store.upsert_games_today(&games_today, batch_size, now).await?;
        self.store.mark_refreshed(RefreshStage::Games, sport, now).await?;
        info!(games = games_today.len(), "Upserted today's games");

        // --- Recent games ---
        self.store.upsert_recent_games(&players, batch_size).await?;
        self.store.upsert_recent_games(&teams, batch_size).await?;
        info!(
            players = players.len(),
            teams = teams.len(),
            "Upserted recent game logs",
        );

        // --- Compute, then diff against the last good snapshot ---
        let snapshot = self.compute(players, teams).await?;
        summary.streaks = snapshot.len();

        let previous = self.store.load_streaks(sport).await?;
        let diff = detect_events(&previous, &snapshot, now);
        summary.shrunk = diff.shrunk.len();
        debug!(
            previous = previous.len(),
            current = snapshot.len(),
            events = diff.events.len(),
            "Snapshot diff complete",
        );

        let filtered = EventTaxonomy::from_config(&self.cfg).apply(diff.events);
        summary.events_filtered = filtered.rejected;

        // --- Persist: events first, then the snapshot they were diffed against ---
        summary.events_written = self.persist_events(&filtered.accepted, batch_size).await?;
        self.store.replace_streaks(sport, &snapshot, batch_size, now).await?;
        self.store.mark_refreshed(RefreshStage::Streaks, sport, now).await?;

        info!(
            sport,
            season = %summary.season,
            players = summary.player_records,
            teams = summary.team_records,
            games_today = summary.scheduled_games,
            streaks = summary.streaks,
            events = summary.events_written,
            filtered = summary.events_filtered,
            warnings = summary.warnings.len(),
            "Streak refresh complete",
        );

        Ok(summary)
    }

    async fn fetch_scoreboard(&self) -> Result<Vec<ScheduledGame>> {
        let timeout = self.cfg.fetch_timeout;
        let games = with_retry(
            self.source.name(),
            self.cfg.fetch_max_attempts,
            &self.backoff_ms,
            || self.source.fetch_scoreboard(timeout),
        )
        .await?;
        if games.is_empty() {
            info!("No games on today's scoreboard");
        }
        Ok(games)
    }

    async fn fetch_logs(&self, kind: EntityKind, window: &FetchWindow) -> Result<Vec<GameRecord>> {
        with_retry(
            self.source.name(),
            self.cfg.fetch_max_attempts,
            &self.backoff_ms,
            || self.source.fetch_game_logs(kind, window),
        )
        .await
    }

    /// Players and teams are computed on blocking workers; both must finish
    /// before the diff sees the snapshot.
    async fn compute(&self, players: Vec<GameRecord>, teams: Vec<GameRecord>) -> Result<Vec<StreakRecord>> {
        let spawn = |records: Vec<GameRecord>| {
            let cfg = Arc::clone(&self.streak_cfg);
            let sport = self.cfg.sport.clone();
            tokio::task::spawn_blocking(move || compute_snapshot(&records, &sport, &cfg))
        };

        let (mut snapshot, team_streaks) = tokio::try_join!(spawn(players), spawn(teams))?;
        info!(
            players = snapshot.len(),
            teams = team_streaks.len(),
            "Computed streak snapshot",
        );
        snapshot.extend(team_streaks);
        Ok(snapshot)
    }

    /// Append events chunk by chunk. The first failing chunk aborts the run.
    async fn persist_events(&self, events: &[StreakEvent], batch_size: usize) -> Result<u64> {
        let mut written = 0;
        for (i, chunk) in events.chunks(batch_size).enumerate() {
            written += self
                .store
                .insert_events(chunk)
                .await
                .map_err(|e| AppError::PersistenceChunk {
                    table: "streak_events",
                    chunk: i,
                    source: Box::new(e),
                })?;
        }
        if written < events.len() as u64 {
            warn!(expected = events.len(), written, "Fewer events written than submitted");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WINDOW_SIZES;
    use crate::types::{EntityId, EventType, GameResult, Stat, StatLine, WindowStat};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use std::time::Duration;

    // --- Fakes ---

    #[derive(Default)]
    struct FakeSource {
        players: Vec<GameRecord>,
        teams: Vec<GameRecord>,
        scoreboard: Vec<ScheduledGame>,
        fail_logs: bool,
    }

    #[async_trait]
    impl GameLogSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch_game_logs(&self, kind: EntityKind, _window: &FetchWindow) -> Result<Vec<GameRecord>> {
            if self.fail_logs {
                return Err(AppError::TransientFetch {
                    source_name: "fake".into(),
                    message: "timed out".into(),
                });
            }
            Ok(match kind {
                EntityKind::Player => self.players.clone(),
                EntityKind::Team => self.teams.clone(),
            })
        }

        async fn fetch_scoreboard(&self, _timeout: Duration) -> Result<Vec<ScheduledGame>> {
            Ok(self.scoreboard.clone())
        }
    }

    #[derive(Default)]
    struct StoreState {
        snapshot: Vec<StreakRecord>,
        events: Vec<StreakEvent>,
        writes: usize,
        event_chunks: usize,
        stamped: Vec<RefreshStage>,
    }

    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<StoreState>,
        fail_event_chunk: Option<usize>,
    }

    impl MemoryStore {
        fn with_snapshot(snapshot: Vec<StreakRecord>) -> Self {
            Self {
                state: Mutex::new(StoreState { snapshot, ..StoreState::default() }),
                fail_event_chunk: None,
            }
        }
    }

    #[async_trait]
    impl StreakStore for MemoryStore {
        async fn upsert_games_today(&self, games: &[ScheduledGame], _: usize, _: DateTime<Utc>) -> Result<u64> {
            self.state.lock().unwrap().writes += 1;
            Ok(games.len() as u64)
        }

        async fn upsert_recent_games(&self, records: &[GameRecord], _: usize) -> Result<u64> {
            self.state.lock().unwrap().writes += 1;
            Ok(records.len() as u64)
        }

        async fn load_streaks(&self, sport: &str) -> Result<Vec<StreakRecord>> {
            let state = self.state.lock().unwrap();
            Ok(state.snapshot.iter().filter(|s| s.sport == sport).cloned().collect())
        }

        async fn replace_streaks(&self, _: &str, records: &[StreakRecord], _: usize, _: DateTime<Utc>) -> Result<u64> {
            let mut state = self.state.lock().unwrap();
            state.writes += 1;
            state.snapshot = records.to_vec();
            Ok(records.len() as u64)
        }

        async fn insert_events(&self, events: &[StreakEvent]) -> Result<u64> {
            let mut state = self.state.lock().unwrap();
            let chunk = state.event_chunks;
            state.event_chunks += 1;
            if self.fail_event_chunk == Some(chunk) {
                return Err(AppError::Io(std::io::Error::other("disk full")));
            }
            state.writes += 1;
            state.events.extend_from_slice(events);
            Ok(events.len() as u64)
        }

        async fn mark_refreshed(&self, stage: RefreshStage, _: &str, _: DateTime<Utc>) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.writes += 1;
            state.stamped.push(stage);
            Ok(())
        }
    }

    // --- Fixtures ---

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap()
    }

    fn player_game(id: i64, d: u32, pts: u32) -> GameRecord {
        GameRecord {
            entity: EntityId::Player(id),
            entity_name: format!("Player {id}"),
            team_abbr: Some("BOS".into()),
            game_id: format!("00225{d:05}"),
            game_date: day(d),
            matchup: None,
            result: None,
            stats: StatLine { pts: Some(pts), ..StatLine::default() },
        }
    }

    fn team_game(d: u32, pts: u32) -> GameRecord {
        GameRecord {
            entity: EntityId::Team("BOS".into()),
            entity_name: "BOS".into(),
            team_abbr: Some("BOS".into()),
            game_id: format!("00225{d:05}"),
            game_date: day(d),
            matchup: None,
            result: Some(GameResult::Win),
            stats: StatLine { pts: Some(pts), ..StatLine::default() },
        }
    }

    fn old_streak(entity: EntityId, stat: Stat, threshold: u32, len: u32) -> StreakRecord {
        StreakRecord {
            entity_name: entity.key(),
            team_abbr: Some("BOS".into()),
            entity,
            sport: "NBA".into(),
            stat,
            threshold,
            streak_len: len,
            streak_start: day(14),
            last_game: day(16),
            streak_win_pct: 100.0,
            season_hits: len,
            season_games: len,
            season_hit_pct: 100.0,
            windows: WINDOW_SIZES.map(|size| WindowStat { size, hits: len, games: len, hit_pct: Some(100.0) }),
        }
    }

    /// Player 1 scores 30 in three straight games; BOS wins three straight
    /// scoring 110. Yields 5 player streaks and 7 team streaks.
    fn source() -> FakeSource {
        FakeSource {
            players: vec![player_game(1, 15, 30), player_game(1, 17, 30), player_game(1, 19, 30)],
            teams: vec![team_game(15, 110), team_game(17, 110), team_game(19, 110)],
            scoreboard: vec![ScheduledGame {
                id: "0022500700".into(),
                home_team_abbr: Some("BOS".into()),
                away_team_abbr: Some("NYK".into()),
                home_score: None,
                away_score: None,
                status: None,
                game_date: day(20),
            }],
            fail_logs: false,
        }
    }

    fn cfg() -> Config {
        Config {
            batch_size: 2,
            min_player_records: 1,
            min_team_records: 1,
            ..Config::default()
        }
    }

    fn reconciler(cfg: Config, source: FakeSource, store: Arc<MemoryStore>) -> Reconciler {
        Reconciler::new(cfg, StreakConfig::nba(), Arc::new(source), store).with_backoff(vec![0])
    }

    // --- Tests ---

    #[tokio::test]
    async fn full_run_emits_transitions_and_replaces_snapshot() {
        let store = Arc::new(MemoryStore::with_snapshot(vec![
            old_streak(EntityId::Player(1), Stat::Points, 25, 2),
            old_streak(EntityId::Player(2), Stat::Assists, 5, 4),
        ]));

        let summary = reconciler(cfg(), source(), Arc::clone(&store))
            .run(day(20), now())
            .await
            .unwrap();

        assert_eq!(summary.season, "2025-26");
        assert_eq!(summary.streaks, 12);
        assert_eq!(summary.events_written, 13);
        assert!(summary.warnings.is_empty());

        let state = store.state.lock().unwrap();
        assert_eq!(state.snapshot.len(), 12);
        assert_eq!(state.stamped, vec![RefreshStage::Games, RefreshStage::Streaks]);

        let extended: Vec<_> = state.events.iter().filter(|e| e.event_type == EventType::Extended).collect();
        assert_eq!(extended.len(), 1);
        assert_eq!(extended[0].threshold, 25);
        assert_eq!((extended[0].prev_streak_len, extended[0].new_streak_len), (2, 3));

        let broken: Vec<_> = state.events.iter().filter(|e| e.event_type == EventType::Broken).collect();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].entity, EntityId::Player(2));
        assert_eq!(broken[0].new_streak_len, 0);
        assert_eq!(broken[0].last_game, day(16));

        let started = state.events.iter().filter(|e| e.event_type == EventType::Started).count();
        assert_eq!(started, 11);
    }

    #[tokio::test]
    async fn empty_player_fetch_aborts_before_any_write() {
        let store = Arc::new(MemoryStore::default());
        let mut src = source();
        src.players.clear();

        let err = reconciler(cfg(), src, Arc::clone(&store)).run(day(20), now()).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyResult { kind: EntityKind::Player }));
        assert_eq!(store.state.lock().unwrap().writes, 0);
    }

    #[tokio::test]
    async fn exhausted_fetch_retries_abort_before_any_write() {
        let store = Arc::new(MemoryStore::default());
        let mut src = source();
        src.fail_logs = true;
        let cfg = Config { fetch_max_attempts: 2, ..cfg() };

        let err = reconciler(cfg, src, Arc::clone(&store)).run(day(20), now()).await.unwrap_err();
        assert!(matches!(err, AppError::FatalFetch { attempts: 2, .. }));
        assert_eq!(store.state.lock().unwrap().writes, 0);
    }

    #[tokio::test]
    async fn failed_event_chunk_aborts_and_keeps_old_snapshot() {
        let old = vec![old_streak(EntityId::Player(2), Stat::Assists, 5, 4)];
        let store = Arc::new(MemoryStore {
            fail_event_chunk: Some(1),
            ..MemoryStore::with_snapshot(old.clone())
        });

        let err = reconciler(cfg(), source(), Arc::clone(&store)).run(day(20), now()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::PersistenceChunk { table: "streak_events", chunk: 1, .. }
        ));

        let state = store.state.lock().unwrap();
        assert_eq!(state.snapshot, old);
        assert_eq!(state.events.len(), 2);
        assert_eq!(state.stamped, vec![RefreshStage::Games]);
    }

    #[tokio::test]
    async fn folded_taxonomy_never_writes_started() {
        let store = Arc::new(MemoryStore::default());
        let cfg = Config {
            allowed_event_types: vec![EventType::Extended, EventType::Broken],
            fold_started_into_extended: true,
            ..cfg()
        };

        let summary = reconciler(cfg, source(), Arc::clone(&store)).run(day(20), now()).await.unwrap();
        assert_eq!(summary.events_filtered, 0);

        let state = store.state.lock().unwrap();
        assert_eq!(state.events.len(), 12);
        assert!(state.events.iter().all(|e| e.event_type == EventType::Extended));
    }

    #[tokio::test]
    async fn thin_and_stale_logs_warn_but_persist() {
        let store = Arc::new(MemoryStore::default());
        let cfg = Config { min_player_records: 10, ..cfg() };

        let summary = reconciler(cfg, source(), Arc::clone(&store)).run(day(25), now()).await.unwrap();
        assert_eq!(summary.warnings.len(), 3);
        assert_eq!(store.state.lock().unwrap().snapshot.len(), 12);
    }
}
