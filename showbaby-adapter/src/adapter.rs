//! The peripheral command adapter - discovery, connection and decoding

use std::collections::HashSet;

use log::{debug, info, warn};
use showbaby_proto::{canonical_form, CommandCode, CommandTable};
use uuid::Uuid;

use crate::error::AdapterError;
use crate::event::{Action, CentralStatus, Event, PeripheralRef};

/// Where the adapter currently is in its session.
///
/// ```text
/// Idle --(scan)--> Scanning --(match)--> Connecting --(connected)-->
/// ServiceDiscovery --(notify subscribed)--> Ready --(disconnect)-->
/// Disconnected --(rescan)--> Scanning
/// ```
///
/// A connect failure reverts `Connecting` to `Idle`; a disconnect event
/// forces `Disconnected` from any state. There are no timeouts: a connect
/// that never completes parks the adapter in `Connecting`, mirroring the
/// underlying stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting,
    ServiceDiscovery,
    Ready,
    Disconnected,
}

/// Adapter configuration.
///
/// The defaults reproduce the broad-discovery behavior: connect to the
/// first peripheral whose advertised name contains `SHOWBABY`, enumerate
/// every service, and subscribe every characteristic. The narrow variant
/// ([`AdapterConfig::with_known_uuids`]) limits discovery to the known
/// command service/characteristic pair instead.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Advertised-name substring identifying the target device
    /// (matched case-insensitively).
    pub target_name: String,
    /// Also surface non-matching peripherals via [`Action::Record`].
    pub list_all_discovered: bool,
    /// Restrict service discovery to this UUID.
    pub service_filter: Option<Uuid>,
    /// Restrict notification subscriptions to this characteristic UUID.
    pub characteristic_filter: Option<Uuid>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            target_name: showbaby_proto::ble::DEVICE_NAME.to_string(),
            list_all_discovered: false,
            service_filter: None,
            characteristic_filter: None,
        }
    }
}

impl AdapterConfig {
    /// Configuration narrowed to the known SHOWBABY command service and
    /// characteristic. Saves battery and discovery time on devices that
    /// expose many unrelated services.
    pub fn with_known_uuids() -> Self {
        Self {
            service_filter: Some(parse_uuid(showbaby_proto::ble::SERVICE_UUID)),
            characteristic_filter: Some(parse_uuid(showbaby_proto::ble::COMMAND_UUID)),
            ..Self::default()
        }
    }
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("invalid UUID in showbaby_proto")
}

/// Bridges raw BLE stack events to semantic command events.
///
/// Owns the connection state, the single-target reference and the ordered
/// command log. At most one peripheral is targeted at a time: once a match
/// is selected, further discoveries are ignored until the link drops.
///
/// Not synchronized - drive it from the one queue that delivers BLE
/// callbacks, or wrap it in your own lock.
pub struct PeripheralCommandAdapter {
    config: AdapterConfig,
    table: CommandTable,
    state: ConnectionState,
    target: Option<PeripheralRef>,
    seen: HashSet<String>,
    log: Vec<CommandCode>,
}

impl PeripheralCommandAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            table: CommandTable::new(),
            state: ConnectionState::Idle,
            target: None,
            seen: HashSet::new(),
            log: Vec::new(),
        }
    }

    /// Current connection state, for banner display.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The currently targeted peripheral, if a match has been selected.
    pub fn target(&self) -> Option<&PeripheralRef> {
        self.target.as_ref()
    }

    /// Decoded commands in arrival order (append-only within a session).
    pub fn commands(&self) -> &[CommandCode] {
        &self.log
    }

    /// Single entry point: dispatches an event to the matching operation,
    /// surfaces any [`AdapterError`] to the log and returns the requests
    /// the stack should execute next.
    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::CentralStatusChanged(status) => self.on_central_status(status),
            Event::PeripheralDiscovered { id, name } => self.on_discovered(&id, name.as_deref()),
            Event::Connected { id } => self.on_connected(&id),
            Event::ConnectFailed { id, reason } => {
                surface(self.on_connect_failed(&id, &reason))
            }
            Event::Disconnected { id, reason } => {
                surface(self.on_disconnected(&id, reason.as_deref()).map(|()| Vec::new()))
            }
            Event::ServicesDiscovered { id, services, error } => {
                surface(self.on_services_discovered(&id, &services, error.as_deref()))
            }
            Event::CharacteristicsDiscovered { service, characteristics, error } => {
                surface(self.on_characteristics_discovered(
                    service,
                    &characteristics,
                    error.as_deref(),
                ))
            }
            Event::ValueUpdated { characteristic, payload, error } => surface(
                self.on_value_updated(characteristic, &payload, error.as_deref())
                    .map(|_| Vec::new()),
            ),
        }
    }

    /// Begin (or restart) a scan session from `Idle` or `Disconnected`.
    /// The roster and command log reset so the new session starts empty.
    pub fn start_scan(&mut self) -> Vec<Action> {
        match self.state {
            ConnectionState::Idle | ConnectionState::Disconnected => {
                self.state = ConnectionState::Scanning;
                self.target = None;
                self.seen.clear();
                self.log.clear();
                vec![Action::StartScan]
            }
            _ => Vec::new(),
        }
    }

    /// React to a central power/authorization change. Scanning starts only
    /// once the radio reports powered-on; every other status is surfaced
    /// and waited out.
    pub fn on_central_status(&mut self, status: CentralStatus) -> Vec<Action> {
        match status {
            CentralStatus::PoweredOn => {
                info!("{}", status.message());
                self.start_scan()
            }
            other => {
                warn!("{}", other.message());
                Vec::new()
            }
        }
    }

    /// A peripheral was seen while scanning.
    ///
    /// The first peripheral whose advertised name contains the configured
    /// target substring (case-insensitive) becomes the target: scanning
    /// stops and a connect is requested. While a target is held, further
    /// matches are ignored. In list-all mode, every peripheral is also
    /// surfaced once via [`Action::Record`].
    pub fn on_discovered(&mut self, id: &str, name: Option<&str>) -> Vec<Action> {
        let mut actions = Vec::new();

        if self.config.list_all_discovered && self.seen.insert(id.to_string()) {
            actions.push(Action::Record(PeripheralRef {
                id: id.to_string(),
                name: name.unwrap_or("Unknown").to_string(),
            }));
        }

        let matched = name.is_some_and(|n| {
            n.to_uppercase().contains(&self.config.target_name.to_uppercase())
        });
        let can_target = self.target.is_none()
            && matches!(self.state, ConnectionState::Idle | ConnectionState::Scanning);

        if matched && can_target {
            let name = name.unwrap_or_default();
            info!("found {name} ({id}), connecting");
            self.target = Some(PeripheralRef {
                id: id.to_string(),
                name: name.to_string(),
            });
            self.state = ConnectionState::Connecting;
            actions.push(Action::StopScan);
            actions.push(Action::Connect { id: id.to_string() });
        } else if matched {
            debug!("ignoring {id}: already targeting a peripheral");
        }

        actions
    }

    /// The connection to the target completed; move on to service
    /// discovery. `filter` stays `None` in the broad path so no service is
    /// missed.
    pub fn on_connected(&mut self, id: &str) -> Vec<Action> {
        if !self.is_target(id) || self.state != ConnectionState::Connecting {
            debug!("ignoring connect event for {id}");
            return Vec::new();
        }
        info!("connected to {id}, discovering services");
        self.state = ConnectionState::ServiceDiscovery;
        vec![Action::DiscoverServices {
            id: id.to_string(),
            filter: self.config.service_filter,
        }]
    }

    /// The connection attempt failed. Reverts to `Idle` and releases the
    /// target; no retry is attempted (the stack offers no connect timeout
    /// either, so any retry policy belongs to the caller).
    pub fn on_connect_failed(
        &mut self,
        id: &str,
        reason: &str,
    ) -> Result<Vec<Action>, AdapterError> {
        if self.is_target(id) && self.state == ConnectionState::Connecting {
            self.target = None;
            self.state = ConnectionState::Idle;
        }
        Err(AdapterError::Connect(reason.to_string()))
    }

    /// Services enumerated: request characteristics for every one of them.
    /// Deliberately broad - filtering at this stage risks missing the
    /// command service on firmware that nests it unexpectedly.
    pub fn on_services_discovered(
        &mut self,
        id: &str,
        services: &[Uuid],
        error: Option<&str>,
    ) -> Result<Vec<Action>, AdapterError> {
        if let Some(reason) = error {
            self.fail_discovery();
            return Err(AdapterError::Discovery(reason.to_string()));
        }
        if !self.is_target(id) || self.state != ConnectionState::ServiceDiscovery {
            debug!("ignoring service discovery for {id}");
            return Ok(Vec::new());
        }
        Ok(services
            .iter()
            .map(|&service| {
                debug!("discovered service {service}");
                Action::DiscoverCharacteristics {
                    service,
                    filter: self.config.characteristic_filter,
                }
            })
            .collect())
    }

    /// Characteristics enumerated for one service: subscribe to the
    /// configured command characteristic, or to all of them when no filter
    /// is set. The first issued subscription makes the session `Ready`.
    pub fn on_characteristics_discovered(
        &mut self,
        service: Uuid,
        characteristics: &[Uuid],
        error: Option<&str>,
    ) -> Result<Vec<Action>, AdapterError> {
        if let Some(reason) = error {
            self.fail_discovery();
            return Err(AdapterError::Discovery(reason.to_string()));
        }
        if !matches!(
            self.state,
            ConnectionState::ServiceDiscovery | ConnectionState::Ready
        ) {
            debug!("ignoring characteristic discovery for service {service}");
            return Ok(Vec::new());
        }

        let actions: Vec<Action> = characteristics
            .iter()
            .filter(|&&c| self.config.characteristic_filter.is_none_or(|f| f == c))
            .map(|&characteristic| Action::SubscribeNotify { characteristic })
            .collect();

        if !actions.is_empty() && self.state == ConnectionState::ServiceDiscovery {
            info!(
                "subscribing {} characteristic(s) under service {service}",
                actions.len()
            );
            self.state = ConnectionState::Ready;
        }
        Ok(actions)
    }

    /// A subscribed characteristic pushed a value. Known payloads append
    /// their command to the log and are returned; anything else is dropped
    /// after a debug note, since the handler sees every subscribed
    /// characteristic, not just command traffic.
    pub fn on_value_updated(
        &mut self,
        characteristic: Uuid,
        payload: &[u8],
        error: Option<&str>,
    ) -> Result<Option<CommandCode>, AdapterError> {
        if let Some(reason) = error {
            return Err(AdapterError::Read(reason.to_string()));
        }
        match self.table.decode(payload) {
            Some(code) => {
                info!("{characteristic}: {code}");
                self.log.push(code);
                Ok(Some(code))
            }
            None => {
                debug!(
                    "{characteristic}: unrecognized payload {}",
                    canonical_form(payload)
                );
                Ok(None)
            }
        }
    }

    /// The link dropped (or was never only ours to begin with). Forces
    /// `Disconnected` and releases the target; safe to deliver twice.
    pub fn on_disconnected(&mut self, id: &str, reason: Option<&str>) -> Result<(), AdapterError> {
        info!("disconnected from {id}");
        self.state = ConnectionState::Disconnected;
        self.target = None;
        match reason {
            Some(r) => Err(AdapterError::Disconnect(r.to_string())),
            None => Ok(()),
        }
    }

    fn is_target(&self, id: &str) -> bool {
        self.target.as_ref().is_some_and(|t| t.id == id)
    }

    // Discovery errors end the session rather than leave it half-explored;
    // there is no partial-discovery recovery.
    fn fail_discovery(&mut self) {
        if matches!(
            self.state,
            ConnectionState::ServiceDiscovery | ConnectionState::Ready
        ) {
            self.state = ConnectionState::Disconnected;
            self.target = None;
        }
    }
}

fn surface(result: Result<Vec<Action>, AdapterError>) -> Vec<Action> {
    result.unwrap_or_else(|err| {
        warn!("{err}");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET_ID: &str = "hci0/dev_AA_BB";
    const OTHER_ID: &str = "hci0/dev_CC_DD";

    fn service_uuid() -> Uuid {
        parse_uuid(showbaby_proto::ble::SERVICE_UUID)
    }

    fn command_uuid() -> Uuid {
        parse_uuid(showbaby_proto::ble::COMMAND_UUID)
    }

    fn adapter() -> PeripheralCommandAdapter {
        PeripheralCommandAdapter::new(AdapterConfig::default())
    }

    fn discovered(id: &str, name: &str) -> Event {
        Event::PeripheralDiscovered {
            id: id.to_string(),
            name: Some(name.to_string()),
        }
    }

    /// Walk a default adapter to `Ready`, subscribed on the command
    /// characteristic.
    fn ready_adapter() -> PeripheralCommandAdapter {
        let mut a = adapter();
        a.handle(Event::CentralStatusChanged(CentralStatus::PoweredOn));
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        a.handle(Event::Connected { id: TARGET_ID.to_string() });
        a.handle(Event::ServicesDiscovered {
            id: TARGET_ID.to_string(),
            services: vec![service_uuid()],
            error: None,
        });
        a.handle(Event::CharacteristicsDiscovered {
            service: service_uuid(),
            characteristics: vec![command_uuid()],
            error: None,
        });
        assert_eq!(a.state(), ConnectionState::Ready);
        a
    }

    #[test]
    fn matching_discovery_stops_scan_and_connects() {
        let mut a = adapter();
        let actions = a.handle(discovered(TARGET_ID, "ShowBaby-42"));
        assert_eq!(
            actions,
            vec![
                Action::StopScan,
                Action::Connect { id: TARGET_ID.to_string() }
            ]
        );
        assert_eq!(a.state(), ConnectionState::Connecting);
        assert_eq!(a.target().unwrap().id, TARGET_ID);
    }

    #[test]
    fn name_match_is_case_insensitive() {
        for name in ["SHOWBABY", "showbaby-7", "My ShOwBaBy"] {
            let mut a = adapter();
            assert!(
                !a.handle(discovered(TARGET_ID, name)).is_empty(),
                "{name} should match"
            );
        }
    }

    #[test]
    fn second_discovery_is_ignored_while_targeted() {
        let mut a = adapter();
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        assert_eq!(a.handle(discovered(TARGET_ID, "SHOWBABY-42")), vec![]);
        assert_eq!(a.handle(discovered(OTHER_ID, "SHOWBABY-43")), vec![]);
        assert_eq!(a.target().unwrap().id, TARGET_ID);
    }

    #[test]
    fn non_matching_discovery_is_ignored() {
        let mut a = adapter();
        assert_eq!(a.handle(discovered(OTHER_ID, "FlowerCare")), vec![]);
        assert_eq!(a.state(), ConnectionState::Idle);
    }

    #[test]
    fn unnamed_discovery_never_matches() {
        let mut a = adapter();
        let actions = a.handle(Event::PeripheralDiscovered {
            id: OTHER_ID.to_string(),
            name: None,
        });
        assert_eq!(actions, vec![]);
        assert_eq!(a.state(), ConnectionState::Idle);
    }

    #[test]
    fn list_all_mode_records_each_peripheral_once() {
        let mut a = PeripheralCommandAdapter::new(AdapterConfig {
            list_all_discovered: true,
            ..AdapterConfig::default()
        });

        let actions = a.handle(discovered(OTHER_ID, "FlowerCare"));
        assert_eq!(
            actions,
            vec![Action::Record(PeripheralRef {
                id: OTHER_ID.to_string(),
                name: "FlowerCare".to_string(),
            })]
        );
        // repeat discovery of the same peripheral is not re-recorded
        assert_eq!(a.handle(discovered(OTHER_ID, "FlowerCare")), vec![]);

        // a match is both recorded and connected to
        let actions = a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        assert_eq!(actions.len(), 3);
        assert!(matches!(actions[0], Action::Record(_)));
        assert_eq!(actions[1], Action::StopScan);
    }

    #[test]
    fn list_all_mode_records_unnamed_peripherals_as_unknown() {
        let mut a = PeripheralCommandAdapter::new(AdapterConfig {
            list_all_discovered: true,
            ..AdapterConfig::default()
        });
        let actions = a.handle(Event::PeripheralDiscovered {
            id: OTHER_ID.to_string(),
            name: None,
        });
        assert_eq!(
            actions,
            vec![Action::Record(PeripheralRef {
                id: OTHER_ID.to_string(),
                name: "Unknown".to_string(),
            })]
        );
    }

    #[test]
    fn connected_requests_broad_service_discovery() {
        let mut a = adapter();
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        let actions = a.handle(Event::Connected { id: TARGET_ID.to_string() });
        assert_eq!(
            actions,
            vec![Action::DiscoverServices {
                id: TARGET_ID.to_string(),
                filter: None,
            }]
        );
        assert_eq!(a.state(), ConnectionState::ServiceDiscovery);
    }

    #[test]
    fn known_uuid_config_narrows_discovery() {
        let mut a = PeripheralCommandAdapter::new(AdapterConfig::with_known_uuids());
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        let actions = a.handle(Event::Connected { id: TARGET_ID.to_string() });
        assert_eq!(
            actions,
            vec![Action::DiscoverServices {
                id: TARGET_ID.to_string(),
                filter: Some(service_uuid()),
            }]
        );
    }

    #[test]
    fn connect_event_for_untargeted_peripheral_is_ignored() {
        let mut a = adapter();
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        assert_eq!(a.handle(Event::Connected { id: OTHER_ID.to_string() }), vec![]);
        assert_eq!(a.state(), ConnectionState::Connecting);
    }

    #[test]
    fn connect_failure_reverts_to_idle_and_releases_target() {
        let mut a = adapter();
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        let err = a
            .on_connect_failed(TARGET_ID, "le-connection-abort-by-local")
            .unwrap_err();
        assert!(matches!(err, AdapterError::Connect(_)));
        assert_eq!(a.state(), ConnectionState::Idle);
        assert!(a.target().is_none());

        // a fresh discovery may retry
        let actions = a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        assert_eq!(actions.last(), Some(&Action::Connect { id: TARGET_ID.to_string() }));
    }

    #[test]
    fn services_fan_out_characteristic_discovery_unfiltered() {
        let mut a = adapter();
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        a.handle(Event::Connected { id: TARGET_ID.to_string() });

        let battery = Uuid::from_u128(0x0000180F_0000_1000_8000_00805F9B34FB);
        let actions = a
            .on_services_discovered(TARGET_ID, &[battery, service_uuid()], None)
            .unwrap();
        assert_eq!(
            actions,
            vec![
                Action::DiscoverCharacteristics { service: battery, filter: None },
                Action::DiscoverCharacteristics { service: service_uuid(), filter: None },
            ]
        );
    }

    #[test]
    fn characteristic_filter_limits_subscriptions() {
        let mut a = PeripheralCommandAdapter::new(AdapterConfig::with_known_uuids());
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        a.handle(Event::Connected { id: TARGET_ID.to_string() });
        a.on_services_discovered(TARGET_ID, &[service_uuid()], None)
            .unwrap();

        let unrelated = Uuid::from_u128(0x0000FFF1_0000_1000_8000_00805F9B34FB);
        let actions = a
            .on_characteristics_discovered(
                service_uuid(),
                &[unrelated, command_uuid()],
                None,
            )
            .unwrap();
        assert_eq!(
            actions,
            vec![Action::SubscribeNotify { characteristic: command_uuid() }]
        );
        assert_eq!(a.state(), ConnectionState::Ready);
    }

    #[test]
    fn without_filter_every_characteristic_is_subscribed() {
        let mut a = adapter();
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        a.handle(Event::Connected { id: TARGET_ID.to_string() });
        a.on_services_discovered(TARGET_ID, &[service_uuid()], None)
            .unwrap();

        let unrelated = Uuid::from_u128(0x0000FFF1_0000_1000_8000_00805F9B34FB);
        let actions = a
            .on_characteristics_discovered(
                service_uuid(),
                &[unrelated, command_uuid()],
                None,
            )
            .unwrap();
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn no_matching_characteristics_stays_in_service_discovery() {
        let mut a = PeripheralCommandAdapter::new(AdapterConfig::with_known_uuids());
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        a.handle(Event::Connected { id: TARGET_ID.to_string() });
        a.on_services_discovered(TARGET_ID, &[service_uuid()], None)
            .unwrap();

        let unrelated = Uuid::from_u128(0x0000FFF1_0000_1000_8000_00805F9B34FB);
        let actions = a
            .on_characteristics_discovered(service_uuid(), &[unrelated], None)
            .unwrap();
        assert_eq!(actions, vec![]);
        assert_eq!(a.state(), ConnectionState::ServiceDiscovery);
    }

    #[test]
    fn value_updates_append_in_arrival_order() {
        let mut a = ready_adapter();
        let c = command_uuid();

        a.on_value_updated(c, b"B2DOWN", None).unwrap();
        a.on_value_updated(c, b"mystery", None).unwrap();
        a.on_value_updated(c, b"B3UP", None).unwrap();
        a.on_value_updated(c, b"B2UP", None).unwrap();

        assert_eq!(
            a.commands(),
            &[
                CommandCode::TriggerDown,
                CommandCode::PumpUp,
                CommandCode::TriggerUp,
            ]
        );
    }

    #[test]
    fn unknown_payload_is_dropped_silently() {
        let mut a = ready_adapter();
        let decoded = a
            .on_value_updated(command_uuid(), &[0xDE, 0xAD], None)
            .unwrap();
        assert_eq!(decoded, None);
        assert!(a.commands().is_empty());
        assert_eq!(a.state(), ConnectionState::Ready);
    }

    #[test]
    fn read_error_changes_nothing() {
        let mut a = ready_adapter();
        a.on_value_updated(command_uuid(), b"B2DOWN", None).unwrap();

        let err = a
            .on_value_updated(command_uuid(), b"", Some("att error 0x0e"))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Read(_)));
        assert_eq!(a.state(), ConnectionState::Ready);
        assert_eq!(a.commands(), &[CommandCode::TriggerDown]);
    }

    #[test]
    fn service_discovery_error_ends_the_session() {
        let mut a = adapter();
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        a.handle(Event::Connected { id: TARGET_ID.to_string() });

        let err = a
            .on_services_discovered(TARGET_ID, &[], Some("gatt error"))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Discovery(_)));
        assert_eq!(a.state(), ConnectionState::Disconnected);
        assert!(a.target().is_none());
        assert!(a.commands().is_empty());
    }

    #[test]
    fn characteristic_discovery_error_ends_the_session() {
        let mut a = adapter();
        a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        a.handle(Event::Connected { id: TARGET_ID.to_string() });
        a.on_services_discovered(TARGET_ID, &[service_uuid()], None)
            .unwrap();

        let err = a
            .on_characteristics_discovered(service_uuid(), &[], Some("gatt error"))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Discovery(_)));
        assert_eq!(a.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_forces_state_from_anywhere_and_is_idempotent() {
        let mut a = ready_adapter();
        a.on_disconnected(TARGET_ID, None).unwrap();
        assert_eq!(a.state(), ConnectionState::Disconnected);
        assert!(a.target().is_none());

        // a second delivery is harmless
        a.on_disconnected(TARGET_ID, None).unwrap();
        assert_eq!(a.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_reason_is_surfaced_as_error() {
        let mut a = ready_adapter();
        let err = a
            .on_disconnected(TARGET_ID, Some("connection timed out"))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Disconnect(_)));
        assert_eq!(a.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn commands_survive_disconnect_until_rescan() {
        let mut a = ready_adapter();
        a.on_value_updated(command_uuid(), b"B4DOWN", None).unwrap();
        a.handle(Event::Disconnected { id: TARGET_ID.to_string(), reason: None });
        assert_eq!(a.commands(), &[CommandCode::ButtonDown]);

        let actions = a.start_scan();
        assert_eq!(actions, vec![Action::StartScan]);
        assert_eq!(a.state(), ConnectionState::Scanning);
        assert!(a.commands().is_empty());

        // and the same device may be targeted again
        let actions = a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        assert_eq!(actions.last(), Some(&Action::Connect { id: TARGET_ID.to_string() }));
    }

    #[test]
    fn powered_on_starts_scanning() {
        let mut a = adapter();
        let actions = a.handle(Event::CentralStatusChanged(CentralStatus::PoweredOn));
        assert_eq!(actions, vec![Action::StartScan]);
        assert_eq!(a.state(), ConnectionState::Scanning);
    }

    #[test]
    fn unusable_central_states_do_not_scan() {
        for status in [
            CentralStatus::PoweredOff,
            CentralStatus::Unsupported,
            CentralStatus::Unauthorized,
            CentralStatus::Resetting,
            CentralStatus::Unknown,
        ] {
            let mut a = adapter();
            assert_eq!(a.handle(Event::CentralStatusChanged(status)), vec![]);
            assert_eq!(a.state(), ConnectionState::Idle);
        }
    }

    #[test]
    fn start_scan_mid_session_is_a_no_op() {
        let mut a = ready_adapter();
        assert_eq!(a.start_scan(), vec![]);
        assert_eq!(a.state(), ConnectionState::Ready);
    }

    #[test]
    fn full_session_end_to_end() {
        let mut a = adapter();

        a.handle(Event::CentralStatusChanged(CentralStatus::PoweredOn));
        assert_eq!(a.state(), ConnectionState::Scanning);

        let actions = a.handle(discovered(TARGET_ID, "SHOWBABY-42"));
        assert_eq!(
            actions,
            vec![
                Action::StopScan,
                Action::Connect { id: TARGET_ID.to_string() }
            ]
        );

        let actions = a.handle(Event::Connected { id: TARGET_ID.to_string() });
        assert_eq!(
            actions,
            vec![Action::DiscoverServices { id: TARGET_ID.to_string(), filter: None }]
        );
        assert_eq!(a.state(), ConnectionState::ServiceDiscovery);

        let actions = a.handle(Event::ServicesDiscovered {
            id: TARGET_ID.to_string(),
            services: vec![service_uuid()],
            error: None,
        });
        assert_eq!(
            actions,
            vec![Action::DiscoverCharacteristics { service: service_uuid(), filter: None }]
        );

        let actions = a.handle(Event::CharacteristicsDiscovered {
            service: service_uuid(),
            characteristics: vec![command_uuid()],
            error: None,
        });
        assert_eq!(
            actions,
            vec![Action::SubscribeNotify { characteristic: command_uuid() }]
        );
        assert_eq!(a.state(), ConnectionState::Ready);

        a.handle(Event::ValueUpdated {
            characteristic: command_uuid(),
            payload: b"B2DOWN".to_vec(),
            error: None,
        });
        assert_eq!(a.commands(), &[CommandCode::TriggerDown]);
    }
}
