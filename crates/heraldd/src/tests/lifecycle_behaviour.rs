//! Behavioural tests for starting and stopping the service.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use herald_types::ServiceEvent;

use crate::bootstrap::BootstrapError;
use crate::transport::ConnectionState;

use super::support::{
    Harness, HealthEvent, RecordingHealthReporter, TestConfigLoader, WAIT_TIMEOUT, announces,
    strip_quotes,
};

type StepResult = Result<(), String>;

struct LifecycleWorld {
    loader: TestConfigLoader,
    reporter: Arc<RecordingHealthReporter>,
    harness: Option<Harness>,
    bootstrap_error: Option<BootstrapError>,
}

impl LifecycleWorld {
    fn new() -> Self {
        Self {
            loader: TestConfigLoader::new(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            harness: None,
            bootstrap_error: None,
        }
    }

    fn bootstrap(&mut self) {
        match Harness::bootstrap_from(&self.loader, &self.reporter, None) {
            Ok(harness) => self.harness = Some(harness),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    fn harness(&self) -> Result<&Harness, String> {
        self.harness
            .as_ref()
            .ok_or_else(|| "service was not bootstrapped".to_owned())
    }

    fn harness_mut(&mut self) -> Result<&mut Harness, String> {
        self.harness
            .as_mut()
            .ok_or_else(|| "service was not bootstrapped".to_owned())
    }
}

#[fixture]
fn world() -> RefCell<LifecycleWorld> {
    RefCell::new(LifecycleWorld::new())
}

#[given("a bootstrapped service with subscriber {subscriber}")]
fn given_service_with_subscriber(world: &RefCell<LifecycleWorld>, subscriber: String) -> StepResult {
    let mut world = world.borrow_mut();
    world.bootstrap();
    world
        .harness()?
        .service
        .directory()
        .add_raw(strip_quotes(&subscriber))
        .map_err(|error| error.to_string())?;
    Ok(())
}

#[given("a configuration without credentials")]
fn given_no_credentials(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().loader = TestConfigLoader::without_credentials();
}

#[when("the service is bootstrapped")]
fn when_bootstrapped(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().bootstrap();
}

#[when("the service starts")]
fn when_service_starts(world: &RefCell<LifecycleWorld>) -> StepResult {
    world
        .borrow_mut()
        .harness_mut()?
        .service
        .start()
        .map_err(|error| error.to_string())
}

#[when("the service stops")]
fn when_service_stops(world: &RefCell<LifecycleWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let harness = world.harness_mut()?;
    if !harness
        .service
        .wait_for_state(ConnectionState::Connected, WAIT_TIMEOUT)
    {
        return Err("service never connected".to_owned());
    }
    harness.service.stop().map_err(|error| error.to_string())
}

#[when("the transport begins disconnecting")]
fn when_transport_disconnects(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let harness = world.harness()?;
    if !harness
        .service
        .wait_for_state(ConnectionState::Connected, WAIT_TIMEOUT)
    {
        return Err("service never connected".to_owned());
    }
    harness
        .transport
        .inject_state(ConnectionState::Disconnecting);
    Ok(())
}

#[then("the service is connected")]
fn then_connected(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let harness = world.harness()?;
    assert!(
        harness
            .service
            .wait_for_state(ConnectionState::Connected, WAIT_TIMEOUT)
    );
    assert_eq!(harness.transport.observer_count(), 1);
    Ok(())
}

#[then("the service is disconnected")]
fn then_disconnected(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let harness = world.harness()?;
    assert_eq!(harness.service.state(), ConnectionState::Disconnected);
    assert!(!harness.service.is_running());
    Ok(())
}

#[then("{subscriber} is notified of {event}")]
fn then_notified(world: &RefCell<LifecycleWorld>, subscriber: String, event: String) -> StepResult {
    let event: ServiceEvent = strip_quotes(&event)
        .parse()
        .map_err(|_| format!("unknown service event {event}"))?;
    let world = world.borrow();
    let notification = world
        .harness()?
        .wait_for_sent(strip_quotes(&subscriber), |envelope| announces(envelope, event));
    assert!(
        notification.is_some(),
        "{subscriber} was not notified of {event}"
    );
    Ok(())
}

#[then("the transport has no observers")]
fn then_no_observers(world: &RefCell<LifecycleWorld>) -> StepResult {
    assert_eq!(world.borrow().harness()?.transport.observer_count(), 0);
    Ok(())
}

#[then("bootstrap fails")]
fn then_bootstrap_fails(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    assert!(world.harness.is_none());
    assert!(matches!(
        world.bootstrap_error,
        Some(BootstrapError::Credentials { .. })
    ));
}

#[then("the bootstrap failure is reported")]
fn then_failure_reported(world: &RefCell<LifecycleWorld>) {
    let events = world.borrow().reporter.events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert!(matches!(events.last(), Some(HealthEvent::BootstrapFailed(_))));
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "Starting connects and announces the connection"
)]
fn starting_connects(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "Stopping announces the shutdown and disconnects"
)]
fn stopping_disconnects(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "A broker-initiated disconnect is announced"
)]
fn broker_disconnect_is_announced(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "Bootstrap fails without credentials"
)]
fn bootstrap_fails_without_credentials(world: RefCell<LifecycleWorld>) {
    drop(world);
}
