// Drive one simulated robot from the keyboard over the backbone
//
// Usage: cargo run --example cmd_publisher
//
//   W/S forward/back   A/D turn        +/- gear
//   1-3 pick robot     Tab swap team   Space stop   Q/Esc quit
//
// Every frame publishes one `speed` command for the selected robot, so the
// actuator sends it one packet per frame.
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::info;
use vss_actuator::config::TOPIC_CMD;
use vss_actuator::messages::BackboneCommand;
use vss_actuator::table::PLAYERS_PER_TEAM;
use zenoh::pubsub::Publisher;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const FRAME: Duration = Duration::from_millis(20);
// Held keys repeat faster than this; a gap longer means the key was released
const RELEASE_AFTER: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gear {
    Crawl,
    Cruise,
    Sprint,
}

impl Gear {
    /// (linear m/s, angular rad/s)
    fn limits(self) -> (f64, f64) {
        match self {
            Gear::Crawl => (0.2, 2.0),
            Gear::Cruise => (0.5, 5.0),
            Gear::Sprint => (1.0, 10.0),
        }
    }

    fn up(self) -> Self {
        match self {
            Gear::Crawl => Gear::Cruise,
            _ => Gear::Sprint,
        }
    }

    fn down(self) -> Self {
        match self {
            Gear::Sprint => Gear::Cruise,
            _ => Gear::Crawl,
        }
    }
}

struct Teleop {
    gear: Gear,
    team: usize,
    robot: usize,
    // -1, 0 or 1 on each axis
    throttle: f64,
    steer: f64,
    last_drive_key: Instant,
}

impl Teleop {
    fn new() -> Self {
        Self {
            gear: Gear::Crawl,
            team: 0,
            robot: 0,
            throttle: 0.0,
            steer: 0.0,
            last_drive_key: Instant::now(),
        }
    }

    /// Apply one key press; false means quit
    fn on_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('w') => self.drive(1.0, self.steer),
            KeyCode::Char('s') => self.drive(-1.0, self.steer),
            KeyCode::Char('a') => self.drive(self.throttle, 1.0),
            KeyCode::Char('d') => self.drive(self.throttle, -1.0),
            KeyCode::Char(' ') => self.drive(0.0, 0.0),
            KeyCode::Char('+') | KeyCode::Char('=') => self.shift(self.gear.up()),
            KeyCode::Char('-') => self.shift(self.gear.down()),
            KeyCode::Char(c @ '1'..='9') => {
                let robot = c as usize - '1' as usize;
                if robot < PLAYERS_PER_TEAM {
                    self.select(self.team, robot);
                }
            }
            KeyCode::Tab => self.select(1 - self.team, self.robot),
            KeyCode::Char('q') | KeyCode::Esc => return false,
            _ => {}
        }
        true
    }

    fn drive(&mut self, throttle: f64, steer: f64) {
        self.throttle = throttle;
        self.steer = steer;
        self.last_drive_key = Instant::now();
    }

    fn shift(&mut self, gear: Gear) {
        if gear != self.gear {
            self.gear = gear;
            info!("Gear: {:?}", gear);
        }
    }

    fn select(&mut self, team: usize, robot: usize) {
        self.team = team;
        self.robot = robot;
        self.drive(0.0, 0.0);
        info!("Driving team {} robot {}", team, robot);
    }

    /// Command for the current frame
    fn command(&mut self) -> BackboneCommand {
        if self.last_drive_key.elapsed() > RELEASE_AFTER {
            self.throttle = 0.0;
            self.steer = 0.0;
        }
        let (v_max, w_max) = self.gear.limits();
        BackboneCommand::Speed {
            team: self.team,
            robot: self.robot,
            v: self.throttle * v_max,
            w: self.steer * w_max,
        }
    }
}

async fn publish(publisher: &Publisher<'_>, command: &BackboneCommand) -> Result<(), BoxError> {
    publisher.put(serde_json::to_string(command)?).await?;
    Ok(())
}

async fn drive(publisher: &Publisher<'_>) -> Result<(), BoxError> {
    let mut teleop = Teleop::new();

    loop {
        if event::poll(FRAME)? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                if kind != KeyEventKind::Release {
                    let previous = (teleop.team, teleop.robot);
                    let keep_going = teleop.on_key(code);
                    // The robot left behind is stopped rather than coasting on its last command
                    if previous != (teleop.team, teleop.robot) {
                        let (team, robot) = previous;
                        let halt = BackboneCommand::Speed { team, robot, v: 0.0, w: 0.0 };
                        publish(publisher, &halt).await?;
                    }
                    if !keep_going {
                        break;
                    }
                }
            }
        }
        publish(publisher, &teleop.command()).await?;
    }

    // Leave the robot standing still
    teleop.drive(0.0, 0.0);
    publish(publisher, &teleop.command()).await
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD).await?;
    info!("Publishing on {}", TOPIC_CMD);

    enable_raw_mode()?;
    let result = drive(&publisher).await;
    disable_raw_mode()?;

    session.close().await?;
    result
}
