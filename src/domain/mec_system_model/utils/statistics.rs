use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::sync::{OnceLock, mpsc};
use std::thread;

/// Target used for structured analytics events emitted with `tracing`.
pub const ANALYTICS_TARGET: &str = "mec_analytics";

/// Columns of the per-cycle statistics file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatParameter {
    /// Clock time of the cycle in ms.
    Time,

    /// Description why this entry was made
    LogDescription,

    /// Name of the scheduling scheme
    Scheme,

    /// Number of requests waiting for admission after pruning
    PendingJobs,

    /// Number of candidate instances produced by the generator
    Candidates,

    /// Number of jobs granted in this cycle
    GrantedJobs,

    /// Number of jobs running (and not rescheduled) at cycle time
    RunningJobs,

    /// Sum of utility of the jobs granted in this cycle
    GrantedUtility,

    /// Utility accumulated over one scheduling interval, running jobs included
    IntervalUtility,

    /// Time spent generating instances in µs
    GenerationTime,

    /// Time spent selecting instances in µs
    SelectionTime,

    /// Whether the cycle result was thrown away because it took too long
    Discarded,
}

impl StatParameter {
    pub const ALL: [StatParameter; 12] = [
        StatParameter::Time,
        StatParameter::LogDescription,
        StatParameter::Scheme,
        StatParameter::PendingJobs,
        StatParameter::Candidates,
        StatParameter::GrantedJobs,
        StatParameter::RunningJobs,
        StatParameter::GrantedUtility,
        StatParameter::IntervalUtility,
        StatParameter::GenerationTime,
        StatParameter::SelectionTime,
        StatParameter::Discarded,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            StatParameter::Time => "Time",
            StatParameter::LogDescription => "LogDescription",
            StatParameter::Scheme => "Scheme",
            StatParameter::PendingJobs => "PendingJobs",
            StatParameter::Candidates => "Candidates",
            StatParameter::GrantedJobs => "GrantedJobs",
            StatParameter::RunningJobs => "RunningJobs",
            StatParameter::GrantedUtility => "GrantedUtility",
            StatParameter::IntervalUtility => "IntervalUtility",
            StatParameter::GenerationTime => "GenerationTime",
            StatParameter::SelectionTime => "SelectionTime",
            StatParameter::Discarded => "Discarded",
        }
    }

    pub fn headers() -> Vec<&'static str> {
        Self::ALL.iter().map(|p| p.header()).collect()
    }
}

/// store values in their native format, only format them when writing to the CSV.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum StatValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl StatValue {
    fn render(&self) -> String {
        match self {
            StatValue::Text(t) => t.clone(),
            StatValue::Integer(i) => i.to_string(),
            StatValue::Float(f) => f.to_string(),
            StatValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<i64> for StatValue {
    fn from(v: i64) -> Self {
        StatValue::Integer(v)
    }
}

impl From<usize> for StatValue {
    fn from(v: usize) -> Self {
        StatValue::Integer(v as i64)
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Float(v)
    }
}

impl From<String> for StatValue {
    fn from(v: String) -> Self {
        StatValue::Text(v)
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        StatValue::Text(v.to_string())
    }
}

impl From<bool> for StatValue {
    fn from(v: bool) -> Self {
        StatValue::Bool(v)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatisticEvent {
    data: HashMap<StatParameter, StatValue>,
}

impl StatisticEvent {
    pub fn new() -> Self {
        Self { data: HashMap::new() }
    }

    pub fn set<V: Into<StatValue>>(&mut self, param: StatParameter, value: V) -> &mut Self {
        self.data.insert(param, value.into());
        self
    }

    pub fn get(&self, param: StatParameter) -> Option<&StatValue> {
        self.data.get(&param)
    }

    fn to_row(&self) -> Vec<String> {
        StatParameter::ALL.iter().map(|p| self.data.get(p).map(StatValue::render).unwrap_or_else(|| "NA".to_string())).collect()
    }
}

enum StatsMessage {
    Log(StatisticEvent),
    Flush,
    Shutdown,
}

/// Writes statistic events as `;` separated CSV rows on a background thread.
pub struct CycleStatsCollector {
    sender: mpsc::Sender<StatsMessage>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CycleStatsCollector {
    /// Spawns the writer thread. `None` writes to stdout.
    pub fn init(filename: Option<String>) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || Self::worker_loop(rx, filename));

        CycleStatsCollector { sender: tx, worker: Some(worker) }
    }

    fn worker_loop(rx: mpsc::Receiver<StatsMessage>, filename: Option<String>) {
        let writer: Box<dyn Write> = match filename {
            Some(f) => match File::create(&f) {
                Ok(file) => Box::new(file),
                Err(e) => {
                    log::error!("Stats Error: could not create statistics file '{}': {}. Falling back to stdout.", f, e);
                    Box::new(io::stdout())
                }
            },
            None => Box::new(io::stdout()),
        };

        let mut csv_wtr = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);

        if let Err(e) = csv_wtr.write_record(StatParameter::headers()) {
            log::error!("Stats Error: Failed to write headers: {}", e);
        }

        for msg in rx {
            match msg {
                StatsMessage::Log(event) => {
                    if let Err(e) = csv_wtr.write_record(event.to_row()) {
                        log::error!("Stats Error: Failed to write record: {}", e);
                    }
                }
                StatsMessage::Flush => {
                    let _ = csv_wtr.flush();
                }
                StatsMessage::Shutdown => break,
            }
        }
        let _ = csv_wtr.flush();
    }

    /// Non-blocking, the event is handed to the writer thread.
    pub fn add_event(&self, event: StatisticEvent) {
        let _ = self.sender.send(StatsMessage::Log(event));
    }

    pub fn flush(&self) {
        let _ = self.sender.send(StatsMessage::Flush);
    }

    /// Flushes and joins the writer thread.
    pub fn shutdown(mut self) {
        let _ = self.sender.send(StatsMessage::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

static GLOBAL_STATS: OnceLock<CycleStatsCollector> = OnceLock::new();

/// Initialize the global statistics collector.
pub fn init_global(filename: Option<String>) {
    let collector = CycleStatsCollector::init(filename);
    let _ = GLOBAL_STATS.set(collector);
}

/// Logs an event to the global collector. Events are dropped silently when
/// statistics were never initialized.
pub fn add_global_event(event: StatisticEvent) {
    if let Some(collector) = GLOBAL_STATS.get() {
        collector.add_event(event);
    } else {
        log::trace!("Statistics event dropped, collector not initialized.");
    }
}

pub fn flush_global() {
    if let Some(collector) = GLOBAL_STATS.get() {
        collector.flush();
    }
}
