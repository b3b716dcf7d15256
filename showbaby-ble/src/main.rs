//! SHOWBABY BLE command listener
//!
//! Scans for a SHOWBABY device, connects, subscribes to its command
//! characteristic and prints the control commands as they arrive.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter,
    ValueNotification,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use clap::{Parser, Subcommand};
use futures::{Stream, StreamExt};
use log::{debug, warn};
use showbaby_adapter::{
    Action, AdapterConfig, CentralStatus, ConnectionState, Event, PeripheralCommandAdapter,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "showbaby-ble")]
#[command(about = "SHOWBABY BLE command listener")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for nearby BLE devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Connect to a SHOWBABY device and print its commands as they arrive
    Watch {
        /// Name substring to match instead of SHOWBABY
        #[arg(short, long)]
        name: Option<String>,
        /// Print every discovered peripheral, not just the match
        #[arg(short, long)]
        list_all: bool,
        /// Only discover the known command service and characteristic
        /// instead of everything the device exposes
        #[arg(long)]
        filtered: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    let central = adapters
        .into_iter()
        .next()
        .ok_or("No Bluetooth adapter found")?;

    match cli.command {
        Commands::Scan { duration } => {
            scan_devices(&central, duration).await?;
        }
        Commands::Watch { name, list_all, filtered } => {
            let mut config = if filtered {
                AdapterConfig::with_known_uuids()
            } else {
                AdapterConfig::default()
            };
            if let Some(name) = name {
                config.target_name = name;
            }
            config.list_all_discovered = list_all;
            watch(&central, config).await?;
        }
    }

    Ok(())
}

async fn scan_devices(central: &Adapter, duration: u64) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for devices ({duration} seconds)...");

    central.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(Duration::from_secs(duration)).await;

    let peripherals = central.peripherals().await?;

    println!("\nFound {} devices:", peripherals.len());
    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
            let rssi = props
                .rssi
                .map(|r| format!("{r} dBm"))
                .unwrap_or_else(|| "N/A".to_string());
            let marker = if showbaby_proto::ble::matches_device_name(&name) {
                " [SHOWBABY]"
            } else {
                ""
            };

            println!("  {} ({}) RSSI: {}{}", name, peripheral.id(), rssi, marker);
        }
    }

    central.stop_scan().await?;
    Ok(())
}

/// Peripheral handles and streams held on behalf of the adapter, which only
/// ever speaks in opaque ids.
struct Session {
    known: HashMap<String, Peripheral>,
    connected: Option<Peripheral>,
    notifications: Option<Pin<Box<dyn Stream<Item = ValueNotification> + Send>>>,
}

async fn watch(central: &Adapter, config: AdapterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let target_name = config.target_name.clone();
    let mut machine = PeripheralCommandAdapter::new(config);
    let mut session = Session {
        known: HashMap::new(),
        connected: None,
        notifications: None,
    };
    let mut events = central.events().await?;
    let mut printed = 0;

    // Not every platform replays the power-up through the event stream; the
    // manager handing out this adapter means the radio is usable, so prime
    // the session as powered-on. A later StateUpdate overrides this.
    println!("Scanning for {target_name}... (ctrl-c to stop)");
    drive(
        &mut machine,
        central,
        &mut session,
        Event::CentralStatusChanged(CentralStatus::PoweredOn),
    )
    .await?;

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                if let Some(event) = map_central_event(central, &mut session, event).await {
                    drive(&mut machine, central, &mut session, event).await?;
                }
            }
            Some(notification) = next_notification(&mut session) => {
                let event = Event::ValueUpdated {
                    characteristic: notification.uuid,
                    payload: notification.value,
                    error: None,
                };
                drive(&mut machine, central, &mut session, event).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping.");
                break;
            }
        }

        // the scrolling command list
        for code in &machine.commands()[printed..] {
            printed += 1;
            println!("{printed:>4}. {code}");
        }

        // a failed connect reverts the adapter to Idle with no retry of its
        // own; re-issuing the scan is this caller's policy
        if machine.state() == ConnectionState::Idle {
            println!("Connection failed; scanning for {target_name} again...");
            printed = 0;
            for action in machine.start_scan() {
                execute(central, &mut session, action).await?;
            }
        }

        if machine.state() == ConnectionState::Disconnected {
            println!(
                "Disconnected. {} command(s) this session.",
                machine.commands().len()
            );
            break;
        }
    }

    if let Some(peripheral) = session.connected.take() {
        let _ = peripheral.disconnect().await;
    }
    Ok(())
}

/// Feed one event through the adapter and execute every action it returns.
/// Actions whose results are immediately known (connect, discovery) produce
/// follow-up events, which are processed in order before returning.
async fn drive(
    machine: &mut PeripheralCommandAdapter,
    central: &Adapter,
    session: &mut Session,
    event: Event,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut pending = VecDeque::from([event]);
    while let Some(event) = pending.pop_front() {
        for action in machine.handle(event) {
            if let Some(follow_up) = execute(central, session, action).await? {
                pending.push_back(follow_up);
            }
        }
    }
    Ok(())
}

/// Translate a btleplug central event into an adapter event. Returns `None`
/// for events the adapter has no use for.
async fn map_central_event(
    central: &Adapter,
    session: &mut Session,
    event: CentralEvent,
) -> Option<Event> {
    match event {
        CentralEvent::StateUpdate(state) => {
            let status = match state {
                CentralState::PoweredOn => CentralStatus::PoweredOn,
                CentralState::PoweredOff => CentralStatus::PoweredOff,
                CentralState::Unknown => CentralStatus::Unknown,
            };
            if status != CentralStatus::PoweredOn {
                println!("{}", status.message());
            }
            Some(Event::CentralStatusChanged(status))
        }
        // updates count as discoveries too: after a rescan, an already
        // cached device only ever reports DeviceUpdated
        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
            let peripheral = central.peripheral(&id).await.ok()?;
            let name = peripheral
                .properties()
                .await
                .ok()
                .flatten()
                .and_then(|props| props.local_name);
            let id = id.to_string();
            session.known.insert(id.clone(), peripheral);
            Some(Event::PeripheralDiscovered { id, name })
        }
        CentralEvent::DeviceConnected(id) => Some(Event::Connected { id: id.to_string() }),
        CentralEvent::DeviceDisconnected(id) => {
            let id = id.to_string();
            session.known.remove(&id);
            // the central reports disconnects for every device it can see;
            // only our own link matters
            if session
                .connected
                .as_ref()
                .is_some_and(|p| p.id().to_string() == id)
            {
                session.connected = None;
                session.notifications = None;
                Some(Event::Disconnected { id, reason: None })
            } else {
                debug!("unrelated device {id} disconnected");
                None
            }
        }
        other => {
            debug!("unhandled central event: {other:?}");
            None
        }
    }
}

/// Next value notification, or never if no subscription is live yet.
async fn next_notification(session: &mut Session) -> Option<ValueNotification> {
    match session.notifications.as_mut() {
        Some(stream) => stream.next().await,
        None => futures::future::pending().await,
    }
}

/// Execute one adapter action against the real BLE stack. Returns the
/// follow-up event when the result is known synchronously.
async fn execute(
    central: &Adapter,
    session: &mut Session,
    action: Action,
) -> Result<Option<Event>, Box<dyn std::error::Error>> {
    match action {
        Action::StartScan => {
            central.start_scan(ScanFilter::default()).await?;
            Ok(None)
        }
        Action::StopScan => {
            central.stop_scan().await?;
            Ok(None)
        }
        Action::Record(peripheral) => {
            println!("  {} ({})", peripheral.name, peripheral.id);
            Ok(None)
        }
        Action::Connect { id } => {
            let Some(peripheral) = session.known.get(&id).cloned() else {
                warn!("connect requested for unknown peripheral {id}");
                return Ok(None);
            };
            println!("Connecting to {id}...");
            match peripheral.connect().await {
                Ok(()) => {
                    session.connected = Some(peripheral);
                    Ok(Some(Event::Connected { id }))
                }
                Err(e) => Ok(Some(Event::ConnectFailed {
                    id,
                    reason: e.to_string(),
                })),
            }
        }
        Action::DiscoverServices { id, filter } => {
            let Some(peripheral) = session.connected.clone() else {
                return Ok(None);
            };
            match peripheral.discover_services().await {
                Ok(()) => {
                    let services: Vec<Uuid> = peripheral
                        .services()
                        .iter()
                        .map(|service| service.uuid)
                        .filter(|&uuid| filter.is_none_or(|f| f == uuid))
                        .collect();
                    Ok(Some(Event::ServicesDiscovered { id, services, error: None }))
                }
                Err(e) => Ok(Some(Event::ServicesDiscovered {
                    id,
                    services: Vec::new(),
                    error: Some(e.to_string()),
                })),
            }
        }
        Action::DiscoverCharacteristics { service, filter } => {
            let Some(peripheral) = session.connected.clone() else {
                return Ok(None);
            };
            // btleplug enumerates characteristics as part of service
            // discovery; answer from the cached set.
            let characteristics: Vec<Uuid> = peripheral
                .characteristics()
                .iter()
                .filter(|c| c.service_uuid == service)
                .map(|c| c.uuid)
                .filter(|&uuid| filter.is_none_or(|f| f == uuid))
                .collect();
            Ok(Some(Event::CharacteristicsDiscovered {
                service,
                characteristics,
                error: None,
            }))
        }
        Action::SubscribeNotify { characteristic } => {
            let Some(peripheral) = session.connected.clone() else {
                return Ok(None);
            };
            let Some(target) = peripheral
                .characteristics()
                .into_iter()
                .find(|c| c.uuid == characteristic)
            else {
                warn!("characteristic {characteristic} disappeared before subscribe");
                return Ok(None);
            };
            if let Err(e) = peripheral.subscribe(&target).await {
                // expected on characteristics without the notify property
                // when running in broad (unfiltered) mode
                warn!("subscribe to {characteristic} failed: {e}");
                return Ok(None);
            }
            if session.notifications.is_none() {
                session.notifications = Some(peripheral.notifications().await?);
            }
            println!("Listening on {characteristic}");
            Ok(None)
        }
    }
}
