// ── Device reconciliation ──
//
// Maps the variable-shaped station/module tree onto a stable set of
// virtual sensors. The topology signature is the station count: when it
// changes, every sensor is removed and the set is rebuilt; otherwise the
// existing sensors are updated in place, matched by `SensorKey`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Presentation;
use crate::model::{
    Accumulator, ChannelKind, DeviceId, DeviceParams, MetricUpdate, Readings, SENSOR_DEVICE_TYPE,
    SensorKey, Snapshot, TemperatureUnit, unit_label,
};
use crate::registry::DeviceRegistry;

/// Reconciler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No snapshot processed since creation or the last teardown.
    Uninitialized,
    /// Entities exist for a topology with `signature` stations.
    Tracking { signature: usize },
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// The entity set was torn down and rebuilt.
    pub rebuilt: bool,
    pub created: usize,
    pub removed: usize,
    /// Entities whose metrics were written.
    pub updated: usize,
    /// Channel values dropped because no entity matched their key.
    pub skipped: usize,
}

/// One channel value in a snapshot, before it is matched to an entity.
#[derive(Debug)]
struct ChannelEntity<'a> {
    key: SensorKey,
    /// Channel name as reported, e.g. `Temperature` or `Rain`.
    channel: &'a str,
    accumulator: Accumulator,
    owner_name: &'a str,
    level: Option<f64>,
}

/// Keeps the registry in line with the latest snapshot.
pub struct Reconciler {
    phase: Phase,
    entities: HashMap<SensorKey, DeviceId>,
    temperature_unit: TemperatureUnit,
    presentation: Presentation,
}

impl Reconciler {
    pub fn new(presentation: Presentation) -> Self {
        Self {
            phase: Phase::Uninitialized,
            entities: HashMap::new(),
            temperature_unit: TemperatureUnit::default(),
            presentation,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Temperature unit resolved at the last rebuild.
    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.temperature_unit
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Apply one snapshot: rebuild on topology change, then write every
    /// current value, icon and `now` into the matching entity.
    pub fn reconcile(
        &mut self,
        snapshot: &Snapshot,
        registry: &dyn DeviceRegistry,
        now: DateTime<Utc>,
    ) -> ReconcileReport {
        let signature = snapshot.station_count();
        let channels = expand(snapshot);
        let mut report = ReconcileReport::default();

        if self.phase != (Phase::Tracking { signature }) {
            report.rebuilt = true;
            report.removed = self.remove_all(registry);
            report.created = self.create_all(snapshot, &channels, registry);
            self.phase = Phase::Tracking { signature };
            info!(
                stations = signature,
                removed = report.removed,
                created = report.created,
                "topology rebuilt"
            );
        }

        for channel in &channels {
            let Some(id) = self.entities.get(&channel.key) else {
                warn!(key = %channel.key, "no entity for channel, skipping update");
                report.skipped += 1;
                continue;
            };

            let icon = self.presentation.icon(channel.channel);
            let accepted = registry.set(id, MetricUpdate::Level(channel.level))
                && registry.set(id, MetricUpdate::Icon(icon))
                && registry.set(id, MetricUpdate::Timestamp(now));

            if accepted {
                report.updated += 1;
            } else {
                warn!(key = %channel.key, device = %id, "registry rejected update, skipping");
                report.skipped += 1;
            }
        }

        debug!(
            updated = report.updated,
            skipped = report.skipped,
            "reconciled snapshot"
        );
        report
    }

    /// Remove every entity and return to [`Phase::Uninitialized`].
    pub fn teardown(&mut self, registry: &dyn DeviceRegistry) -> usize {
        let removed = self.remove_all(registry);
        self.phase = Phase::Uninitialized;
        removed
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn remove_all(&mut self, registry: &dyn DeviceRegistry) -> usize {
        let mut removed = 0;
        for (key, id) in self.entities.drain() {
            if registry.remove(&id) {
                removed += 1;
            } else {
                debug!(%key, device = %id, "entity already gone from registry");
            }
        }
        removed
    }

    fn create_all(
        &mut self,
        snapshot: &Snapshot,
        channels: &[ChannelEntity<'_>],
        registry: &dyn DeviceRegistry,
    ) -> usize {
        // Resolved once per build and shared by every temperature entity.
        self.temperature_unit = TemperatureUnit::from(snapshot.unit_system);

        for channel in channels {
            let id = registry.create(self.params(channel));
            self.entities.insert(channel.key.clone(), id);
        }
        channels.len()
    }

    fn params(&self, channel: &ChannelEntity<'_>) -> DeviceParams {
        let labels = &self.presentation.labels;
        let label = labels.channel(channel.channel);
        let title = match (is_rain(channel.channel), channel.accumulator) {
            (true, Accumulator::Instant) => {
                format!("{} {label} ({})", channel.owner_name, labels.current)
            }
            (true, Accumulator::LastHour) => {
                format!("{} {label} ({})", channel.owner_name, labels.last1)
            }
            (true, Accumulator::LastDay) => {
                format!("{} {label} ({})", channel.owner_name, labels.last24)
            }
            (false, _) => format!("{} {label}", channel.owner_name),
        };

        DeviceParams {
            device_id: channel.key.device_id(&self.presentation.device_prefix),
            device_type: SENSOR_DEVICE_TYPE.into(),
            title,
            probe_title: label.to_owned(),
            scale_title: unit_label(channel.channel, self.temperature_unit),
            icon: self.presentation.icon(channel.channel),
        }
    }
}

fn is_rain(channel: &str) -> bool {
    channel.eq_ignore_ascii_case("rain")
}

/// The dashboard field holding a channel's instant value.
fn reading_key(channel: &str) -> &str {
    channel
        .parse::<ChannelKind>()
        .map_or(channel, |kind| kind.reading_key())
}

/// Flatten a snapshot into one entry per mirrored value.
///
/// Base stations contribute their five indoor channels; modules one entry
/// per reported channel, or three for rain. A channel repeated within the
/// same module is only mirrored once.
fn expand(snapshot: &Snapshot) -> Vec<ChannelEntity<'_>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for station in &snapshot.stations {
        for kind in ChannelKind::BASE_STATION {
            let channel: &'static str = kind.into();
            push_unique(
                &mut out,
                &mut seen,
                ChannelEntity {
                    key: SensorKey::new(channel, Accumulator::Instant, &station.id, &station.id),
                    channel,
                    accumulator: Accumulator::Instant,
                    owner_name: &station.name,
                    level: station.indoor.get(kind.reading_key()),
                },
            );
        }

        for module in &station.modules {
            for channel in &module.channels {
                let accumulators: &[Accumulator] = if is_rain(channel) {
                    &Accumulator::RAIN
                } else {
                    &[Accumulator::Instant]
                };

                for &accumulator in accumulators {
                    push_unique(
                        &mut out,
                        &mut seen,
                        ChannelEntity {
                            key: SensorKey::new(channel, accumulator, &station.id, &module.id),
                            channel,
                            accumulator,
                            owner_name: &module.name,
                            level: module_level(&module.readings, channel, accumulator),
                        },
                    );
                }
            }
        }
    }

    out
}

fn module_level(readings: &Readings, channel: &str, accumulator: Accumulator) -> Option<f64> {
    match accumulator.rain_reading_key() {
        Some(field) => readings.get(field),
        None => readings.get(reading_key(channel)),
    }
}

fn push_unique<'a>(
    out: &mut Vec<ChannelEntity<'a>>,
    seen: &mut HashSet<SensorKey>,
    entity: ChannelEntity<'a>,
) {
    if seen.insert(entity.key.clone()) {
        out.push(entity);
    } else {
        debug!(key = %entity.key, "duplicate channel ignored");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Module, Station, UnitSystem, VirtualSensor};
    use crate::registry::MemoryRegistry;

    // ── Fixtures ─────────────────────────────────────────────────────

    fn station(id: &str, temperature: f64, modules: Vec<Module>) -> Station {
        Station {
            id: id.into(),
            name: format!("Station {id}"),
            indoor: [
                ("Temperature", temperature),
                ("Humidity", 45.0),
                ("CO2", 610.0),
                ("Noise", 37.0),
                ("Pressure", 1013.2),
            ]
            .into_iter()
            .collect(),
            measured_at: None,
            modules,
        }
    }

    fn rain_module(id: &str) -> Module {
        Module {
            id: id.into(),
            name: "Garden".into(),
            channels: vec!["Rain".into()],
            readings: [("Rain", 0.5), ("sum_rain_1", 2.0), ("sum_rain_24", 10.0)]
                .into_iter()
                .collect(),
            reachable: true,
            battery_percent: Some(90),
            measured_at: None,
        }
    }

    fn outdoor_module(id: &str) -> Module {
        Module {
            id: id.into(),
            name: "Outdoor".into(),
            channels: vec!["Temperature".into(), "Humidity".into()],
            readings: [("Temperature", 8.5), ("Humidity", 80.0)]
                .into_iter()
                .collect(),
            reachable: true,
            battery_percent: None,
            measured_at: None,
        }
    }

    fn snapshot(stations: Vec<Station>) -> Snapshot {
        Snapshot {
            unit_system: UnitSystem::Metric,
            stations,
            server_time: None,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn by_title<'a>(sensors: &'a [Arc<VirtualSensor>], title: &str) -> &'a VirtualSensor {
        sensors
            .iter()
            .find(|s| s.title == title)
            .unwrap_or_else(|| panic!("no sensor titled {title:?}"))
    }

    /// Registry that records the order of creates and removes.
    #[derive(Default)]
    struct RecordingRegistry {
        inner: MemoryRegistry,
        ops: Mutex<Vec<&'static str>>,
    }

    impl DeviceRegistry for RecordingRegistry {
        fn create(&self, params: DeviceParams) -> DeviceId {
            self.ops.lock().unwrap().push("create");
            self.inner.create(params)
        }

        fn remove(&self, id: &DeviceId) -> bool {
            self.ops.lock().unwrap().push("remove");
            self.inner.remove(id)
        }

        fn set(&self, id: &DeviceId, update: MetricUpdate) -> bool {
            self.inner.set(id, update)
        }

        fn list(&self) -> Vec<Arc<VirtualSensor>> {
            self.inner.list()
        }
    }

    // ── Scenarios ────────────────────────────────────────────────────

    #[test]
    fn rain_module_yields_three_entities() {
        let registry = MemoryRegistry::new();
        let mut reconciler = Reconciler::new(Presentation::default());

        let report = reconciler.reconcile(
            &snapshot(vec![station("st", 21.0, vec![rain_module("rg")])]),
            &registry,
            at(0),
        );

        assert_eq!(
            report,
            ReconcileReport {
                rebuilt: true,
                created: 8,
                removed: 0,
                updated: 8,
                skipped: 0,
            }
        );
        assert_eq!(reconciler.phase(), Phase::Tracking { signature: 1 });

        let sensors = registry.list();
        assert_eq!(sensors.len(), 8);
        assert_eq!(by_title(&sensors, "Garden Rain (current)").level, Some(0.5));
        assert_eq!(by_title(&sensors, "Garden Rain (last hour)").level, Some(2.0));
        assert_eq!(by_title(&sensors, "Garden Rain (last 24h)").level, Some(10.0));

        let rain = by_title(&sensors, "Garden Rain (last 24h)");
        assert_eq!(rain.unit, "mm");
        assert_eq!(rain.icon.as_deref(), Some("/modulemedia/atmolink/rain.png"));
        assert_eq!(rain.updated_at, Some(at(0)));

        let co2 = by_title(&sensors, "Station st CO2");
        assert_eq!(co2.level, Some(610.0));
        assert_eq!(co2.unit, "ppm");
        assert_eq!(co2.icon.as_deref(), Some("/modulemedia/atmolink/co2.png"));
    }

    #[test]
    fn unchanged_topology_updates_in_place() {
        let registry = RecordingRegistry::default();
        let mut reconciler = Reconciler::new(Presentation::default());

        reconciler.reconcile(
            &snapshot(vec![station("st", 21.0, vec![rain_module("rg")])]),
            &registry,
            at(0),
        );
        let ids_before: Vec<_> = registry.list().iter().map(|s| s.id.clone()).collect();
        registry.ops.lock().unwrap().clear();

        let report = reconciler.reconcile(
            &snapshot(vec![station("st", 23.5, vec![rain_module("rg")])]),
            &registry,
            at(600),
        );

        assert!(!report.rebuilt);
        assert_eq!((report.created, report.removed), (0, 0));
        assert_eq!(report.updated, 8);
        assert!(registry.ops.lock().unwrap().is_empty());

        let sensors = registry.list();
        let ids_after: Vec<_> = sensors.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids_before, ids_after);

        let temperature = by_title(&sensors, "Station st Temperature");
        assert_eq!(temperature.level, Some(23.5));
        assert_eq!(temperature.updated_at, Some(at(600)));
        assert_eq!(by_title(&sensors, "Station st Humidity").level, Some(45.0));
    }

    #[test]
    fn station_count_change_removes_before_creating() {
        let registry = RecordingRegistry::default();
        let mut reconciler = Reconciler::new(Presentation::default());

        reconciler.reconcile(&snapshot(vec![station("a", 20.0, vec![])]), &registry, at(0));
        registry.ops.lock().unwrap().clear();

        let report = reconciler.reconcile(
            &snapshot(vec![
                station("a", 20.0, vec![]),
                station("b", 19.0, vec![outdoor_module("out")]),
            ]),
            &registry,
            at(60),
        );

        assert!(report.rebuilt);
        assert_eq!(report.removed, 5);
        assert_eq!(report.created, 12);
        assert_eq!(reconciler.phase(), Phase::Tracking { signature: 2 });

        let ops = registry.ops.lock().unwrap().clone();
        let first_create = ops.iter().position(|op| *op == "create").unwrap();
        let last_remove = ops.iter().rposition(|op| *op == "remove").unwrap();
        assert!(last_remove < first_create, "ops out of order: {ops:?}");
        assert_eq!(registry.list().len(), 12);
    }

    #[test]
    fn temperature_unit_resolved_once_per_build() {
        let registry = MemoryRegistry::new();
        let mut reconciler = Reconciler::new(Presentation::default());
        let mut snap = snapshot(vec![station("st", 70.0, vec![outdoor_module("out")])]);
        snap.unit_system = UnitSystem::Imperial;

        reconciler.reconcile(&snap, &registry, at(0));

        assert_eq!(reconciler.temperature_unit(), TemperatureUnit::Fahrenheit);
        let units: Vec<_> = registry
            .list()
            .iter()
            .filter(|s| s.probe_title == "Temperature")
            .map(|s| s.unit.clone())
            .collect();
        assert_eq!(units, vec!["°F".to_string(), "°F".to_string()]);
    }

    #[test]
    fn keys_survive_station_reordering() {
        let registry = MemoryRegistry::new();
        let mut reconciler = Reconciler::new(Presentation::default());

        reconciler.reconcile(
            &snapshot(vec![station("a", 20.0, vec![]), station("b", 10.0, vec![])]),
            &registry,
            at(0),
        );
        let report = reconciler.reconcile(
            &snapshot(vec![station("b", 11.0, vec![]), station("a", 21.0, vec![])]),
            &registry,
            at(60),
        );

        assert!(!report.rebuilt);
        assert_eq!(report.skipped, 0);
        let sensors = registry.list();
        assert_eq!(by_title(&sensors, "Station a Temperature").level, Some(21.0));
        assert_eq!(by_title(&sensors, "Station b Temperature").level, Some(11.0));
    }

    #[test]
    fn new_module_without_count_change_is_skipped() {
        let registry = MemoryRegistry::new();
        let mut reconciler = Reconciler::new(Presentation::default());

        reconciler.reconcile(&snapshot(vec![station("st", 20.0, vec![])]), &registry, at(0));
        let report = reconciler.reconcile(
            &snapshot(vec![station("st", 20.0, vec![rain_module("rg")])]),
            &registry,
            at(60),
        );

        assert!(!report.rebuilt);
        assert_eq!(report.updated, 5);
        assert_eq!(report.skipped, 3);
        assert_eq!(registry.list().len(), 5);
    }

    #[test]
    fn entity_removed_behind_our_back_is_skipped() {
        let registry = MemoryRegistry::new();
        let mut reconciler = Reconciler::new(Presentation::default());
        let snap = snapshot(vec![station("st", 20.0, vec![])]);

        reconciler.reconcile(&snap, &registry, at(0));
        let victim = registry.list()[0].id.clone();
        registry.remove(&victim);

        let report = reconciler.reconcile(&snap, &registry, at(60));
        assert_eq!(report.updated, 4);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn unknown_channel_keeps_its_name_and_unit() {
        let registry = MemoryRegistry::new();
        let mut reconciler = Reconciler::new(Presentation::default());
        let mut module = outdoor_module("out");
        module.channels = vec!["Wind".into(), "Lux".into()];
        module.readings = [("WindStrength", 12.0), ("Lux", 300.0)].into_iter().collect();

        reconciler.reconcile(
            &snapshot(vec![station("st", 20.0, vec![module])]),
            &registry,
            at(0),
        );

        let sensors = registry.list();
        let wind = by_title(&sensors, "Outdoor Wind");
        assert_eq!(wind.level, Some(12.0));
        assert_eq!(wind.unit, "km/h");
        let lux = by_title(&sensors, "Outdoor Lux");
        assert_eq!(lux.level, Some(300.0));
        assert_eq!(lux.unit, "Lux");
    }

    #[test]
    fn reading_key_maps_known_channels_and_passes_others_through() {
        assert_eq!(reading_key("Wind"), "WindStrength");
        assert_eq!(reading_key("CO2"), "CO2");
        assert_eq!(reading_key("sum_rain_24"), "sum_rain_24");
    }

    #[test]
    fn missing_reading_clears_level() {
        let registry = MemoryRegistry::new();
        let mut reconciler = Reconciler::new(Presentation::default());
        let mut st = station("st", 20.0, vec![]);

        reconciler.reconcile(&snapshot(vec![st.clone()]), &registry, at(0));
        st.indoor = Readings::default();
        reconciler.reconcile(&snapshot(vec![st]), &registry, at(60));

        assert!(registry.list().iter().all(|s| s.level.is_none()));
    }

    #[test]
    fn teardown_removes_everything() {
        let registry = MemoryRegistry::new();
        let mut reconciler = Reconciler::new(Presentation::default());
        reconciler.reconcile(
            &snapshot(vec![station("st", 20.0, vec![rain_module("rg")])]),
            &registry,
            at(0),
        );

        assert_eq!(reconciler.teardown(&registry), 8);
        assert!(registry.is_empty());
        assert!(reconciler.is_empty());
        assert_eq!(reconciler.phase(), Phase::Uninitialized);

        // The next snapshot rebuilds from scratch.
        let report = reconciler.reconcile(
            &snapshot(vec![station("st", 20.0, vec![])]),
            &registry,
            at(60),
        );
        assert!(report.rebuilt);
        assert_eq!(report.created, 5);
    }
}
