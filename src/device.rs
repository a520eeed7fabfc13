//! One-to-one façade over a discovered cast device: descriptor, connection
//! management, application launch, and device-level volume.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use futures::future::{self, Either, Loop};
use futures::prelude::*;
use futures_locks::RwLock;
use url::Url;

use crate::channel::{self, Channel, Config, DEFAULT_RESPONSE_TIMEOUT};
use crate::discovery::{self, Capabilities, ServiceRecord};
use crate::error::Error;
use crate::message;
use crate::payload::receiver::{self, Application, Volume, VolumeControlType};
use crate::session::Session;

/// Fallback step for master-volume ramps when the device does not advertise
/// one.
const DEFAULT_VOLUME_STEP: f64 = 0.05;
/// Upper bound on ramp iterations for a device that never converges.
const MAX_RAMP_STEPS: usize = 64;
const UNIDENTIFIED: &str = "Unidentified cast device";

/// Immutable descriptor of a cast device, built from a discovery record or
/// user-supplied parameters. At least one of the IPv4/IPv6 addresses is
/// always present.
#[derive(Clone, Debug)]
pub struct CastDevice {
    dns_name: String,
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
    port: u16,
    unique_id: Option<String>,
    application_url: Option<Url>,
    service_name: Option<String>,
    capabilities: Capabilities,
    friendly_name: Option<String>,
    model_name: Option<String>,
    protocol_version: i32,
    icon_path: Option<String>,
}

impl CastDevice {
    pub fn new(dns_name: &str, addr: IpAddr) -> Self {
        let (ipv4, ipv6) = match addr {
            IpAddr::V4(v4) => (Some(v4), None),
            IpAddr::V6(v6) => (None, Some(v6)),
        };
        CastDevice {
            dns_name: dns_name.to_owned(),
            ipv4,
            ipv6,
            port: message::DEFAULT_PORT,
            unique_id: None,
            application_url: None,
            service_name: None,
            capabilities: Capabilities::default(),
            friendly_name: None,
            model_name: None,
            protocol_version: -1,
            icon_path: None,
        }
    }

    /// Build a descriptor from a resolved DNS-SD announcement.
    pub fn from_record(record: &ServiceRecord) -> Result<Self, Error> {
        if record.ipv4.is_none() && record.ipv6.is_none() {
            return Err(Error::Protocol(format!(
                "discovery record for {} carries no address",
                record.dns_name
            )));
        }
        Ok(CastDevice {
            dns_name: record.dns_name.clone(),
            ipv4: record.ipv4,
            ipv6: record.ipv6,
            port: record.port,
            unique_id: record.txt_value(discovery::TXT_KEY_ID).map(str::to_owned),
            application_url: None,
            service_name: Some(discovery::SERVICE_NAME.to_owned()),
            capabilities: Capabilities::from_txt(
                record.txt_value(discovery::TXT_KEY_CAPABILITIES),
            ),
            friendly_name: record
                .txt_value(discovery::TXT_KEY_FRIENDLY_NAME)
                .map(str::to_owned),
            model_name: record
                .txt_value(discovery::TXT_KEY_MODEL_NAME)
                .map(str::to_owned),
            protocol_version: discovery::protocol_version(
                record.txt_value(discovery::TXT_KEY_VERSION),
            ),
            icon_path: record.txt_value(discovery::TXT_KEY_ICON).map(str::to_owned),
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_friendly_name(mut self, name: &str) -> Self {
        self.friendly_name = Some(name.to_owned());
        self
    }

    pub fn with_model_name(mut self, name: &str) -> Self {
        self.model_name = Some(name.to_owned());
        self
    }

    pub fn with_application_url(mut self, url: Url) -> Self {
        self.application_url = Some(url);
        self
    }

    pub fn dns_name(&self) -> &str {
        &self.dns_name
    }

    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.ipv4
    }

    pub fn ipv6(&self) -> Option<Ipv6Addr> {
        self.ipv6
    }

    pub fn address(&self) -> IpAddr {
        if let Some(v4) = self.ipv4 {
            IpAddr::V4(v4)
        } else if let Some(v6) = self.ipv6 {
            IpAddr::V6(v6)
        } else {
            // Constructors guarantee at least one address.
            unreachable!("cast device descriptor without address")
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address(), self.port)
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_ref().map(String::as_str)
    }

    pub fn application_url(&self) -> Option<&Url> {
        self.application_url.as_ref()
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_ref().map(String::as_str)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_ref().map(String::as_str)
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_ref().map(String::as_str)
    }

    /// Protocol version from the `ve` TXT key; `-1` means unknown.
    pub fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    pub fn icon_path(&self) -> Option<&str> {
        self.icon_path.as_ref().map(String::as_str)
    }

    /// Name used for logging and matching: the friendly name when present,
    /// otherwise the DNS name with its hex suffix stripped, otherwise a
    /// fixed placeholder. A distinct model name is appended in parentheses.
    pub fn display_name(&self) -> String {
        let base = match self.friendly_name {
            Some(ref name) if !name.trim().is_empty() => name.clone(),
            _ => match name::base_name(&self.dns_name) {
                Some(base) => base,
                None => UNIDENTIFIED.to_owned(),
            },
        };
        match self.model_name {
            Some(ref model) if !model.trim().is_empty() && *model != base => {
                format!("{} ({})", base, model)
            }
            _ => base,
        }
    }
}

/// Parser for DNS names of the shape `<base>-<hex serial>`, optionally
/// surrounded by whitespace. The whole input must match.
mod name {
    use nom::types::CompleteStr;

    named!(parse<CompleteStr, CompleteStr>,
    do_parse!(
        take_while!(call!(|c: char| c.is_whitespace())) >>
        base: take_while1!(call!(|c: char| !c.is_whitespace() && c != '-')) >>
        char!('-') >>
        take_while!(call!(|c: char| c.is_ascii_hexdigit())) >>
        take_while!(call!(|c: char| c.is_whitespace())) >>
        eof!() >>
        (base)
    )
    );

    pub fn base_name(dns_name: &str) -> Option<String> {
        match parse(CompleteStr(dns_name)) {
            Ok((_, base)) => Some(base.as_ref().to_owned()),
            Err(_) => None,
        }
    }
}

/// Connection façade over one cast device. Operations transparently
/// reconnect once when `auto_reconnect` is set; otherwise they fail with
/// `Disconnected` while the channel is down.
#[derive(Clone, Debug)]
pub struct Device {
    descriptor: CastDevice,
    auto_reconnect: bool,
    response_timeout: Duration,
    channel: RwLock<Option<Channel>>,
}

impl Device {
    pub fn new(descriptor: CastDevice, auto_reconnect: bool) -> Self {
        Self {
            descriptor,
            auto_reconnect,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            channel: RwLock::new(None),
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn descriptor(&self) -> &CastDevice {
        &self.descriptor
    }

    fn config(&self) -> Config {
        Config {
            addr: self.descriptor.socket_addr(),
            name: self.descriptor.display_name(),
            sender_id: None,
            response_timeout: self.response_timeout,
        }
    }

    /// Open the channel if it is not already open.
    pub fn connect(&self) -> Box<dyn Future<Item = (), Error = Error> + Send> {
        Box::new(open_channel(self.channel.clone(), self.config()).map(|_| ()))
    }

    pub fn disconnect(&self) -> Box<dyn Future<Item = (), Error = Error> + Send> {
        Box::new(
            self.channel
                .write()
                .map_err(|_| Error::Disconnected)
                .and_then(|mut slot| match slot.take() {
                    Some(channel) => Either::A(channel.close()),
                    None => Either::B(future::ok(())),
                }),
        )
    }

    pub fn is_connected(&self) -> Box<dyn Future<Item = bool, Error = Error> + Send> {
        Box::new(
            self.channel
                .read()
                .map_err(|_| Error::Disconnected)
                .map(|slot| slot.as_ref().map_or(false, Channel::is_connected)),
        )
    }

    /// Resolve the channel for an operation, reconnecting once when
    /// `auto_reconnect` is set.
    fn channel(&self) -> Box<dyn Future<Item = Channel, Error = Error> + Send> {
        let auto_reconnect = self.auto_reconnect;
        let lock = self.channel.clone();
        let config = self.config();
        Box::new(
            self.channel
                .read()
                .map_err(|_| Error::Disconnected)
                .and_then(
                    move |slot| -> Box<dyn Future<Item = Channel, Error = Error> + Send> {
                        if let Some(ref channel) = *slot {
                            if channel.is_connected() {
                                return Box::new(future::ok(channel.clone()));
                            }
                        }
                        drop(slot);
                        if auto_reconnect {
                            Box::new(open_channel(lock, config))
                        } else {
                            Box::new(future::err(Error::Disconnected))
                        }
                    },
                ),
        )
    }

    pub fn receiver_status(
        &self,
    ) -> Box<dyn Future<Item = receiver::Status, Error = Error> + Send> {
        Box::new(self.channel().and_then(|channel| channel.receiver_status()))
    }

    /// Whether `app_id` can be launched on this device.
    pub fn app_availability(
        &self,
        app_id: &str,
    ) -> Box<dyn Future<Item = bool, Error = Error> + Send> {
        let wanted = app_id.to_owned();
        let lookup = wanted.clone();
        Box::new(
            self.channel()
                .and_then(move |channel| channel.app_availability(&[wanted.as_str()]))
                .map(move |availability| {
                    availability.get(&lookup) == Some(&receiver::AppAvailability::AppAvailable)
                }),
        )
    }

    /// Launch an application. With `synchronous` the launched application's
    /// descriptor is returned; fire-and-forget returns `None`.
    pub fn launch_app(
        &self,
        app_id: &str,
        synchronous: bool,
    ) -> Box<dyn Future<Item = Option<Application>, Error = Error> + Send> {
        let app_id = app_id.to_owned();
        if !synchronous {
            return Box::new(self.channel().and_then(move |channel| {
                let request_id = channel.next_request_id();
                let payload = receiver::Request::Launch { app_id, request_id };
                future::result(channel.receiver_fire(&payload).map(|()| None))
            }));
        }
        let wanted = app_id.clone();
        Box::new(
            self.channel()
                .and_then(move |channel| channel.launch(&app_id))
                .and_then(move |status| {
                    status
                        .applications
                        .into_iter()
                        .find(|app| app.app_id == wanted)
                        .map(Some)
                        .ok_or_else(|| {
                            Error::LaunchError(Some(
                                "application missing from receiver status".to_owned(),
                            ))
                        })
                }),
        )
    }

    /// Receiver-level stop of a running application.
    pub fn stop_app(
        &self,
        application: &Application,
        synchronous: bool,
    ) -> Box<dyn Future<Item = Option<receiver::Status>, Error = Error> + Send> {
        let session_id = application.session_id.clone();
        if !synchronous {
            return Box::new(self.channel().and_then(move |channel| {
                let request_id = channel.next_request_id();
                let payload = receiver::Request::Stop {
                    session_id,
                    request_id,
                };
                future::result(channel.receiver_fire(&payload).map(|()| None))
            }));
        }
        Box::new(
            self.channel()
                .and_then(move |channel| channel.stop_app(&session_id))
                .map(Some),
        )
    }

    /// Bind a session to a running application, opening the virtual
    /// connection to its transport.
    pub fn start_session(
        &self,
        application: &Application,
    ) -> Box<dyn Future<Item = Session, Error = Error> + Send> {
        let application = application.clone();
        Box::new(self.channel().and_then(move |channel| {
            let connect = channel.ensure_connection(&application.transport_id);
            connect.map(move |()| Session::new(&channel, &application))
        }))
    }

    pub fn set_volume(
        &self,
        volume: Volume,
    ) -> Box<dyn Future<Item = receiver::Status, Error = Error> + Send> {
        Box::new(
            self.channel()
                .and_then(move |channel| channel.set_receiver_volume(volume)),
        )
    }

    pub fn set_muted(
        &self,
        muted: bool,
    ) -> Box<dyn Future<Item = receiver::Status, Error = Error> + Send> {
        self.set_volume(Volume::from(muted))
    }

    /// Set the volume level, clamped to `[0, 1]`. Master-volume devices are
    /// walked toward the target in advertised steps; fixed-volume devices
    /// fail with `FixedVolume`.
    pub fn set_volume_level(
        &self,
        level: f64,
    ) -> Box<dyn Future<Item = receiver::Status, Error = Error> + Send> {
        let target = clamp_level(level);
        Box::new(
            self.channel()
                .and_then(move |channel| stepped_volume(channel, target)),
        )
    }
}

fn clamp_level(level: f64) -> f64 {
    if level < 0.0 {
        0.0
    } else if level > 1.0 {
        1.0
    } else {
        level
    }
}

fn open_channel(
    lock: RwLock<Option<Channel>>,
    config: Config,
) -> impl Future<Item = Channel, Error = Error> {
    lock.write()
        .map_err(|_| Error::Disconnected)
        .and_then(move |mut slot| {
            if let Some(ref channel) = *slot {
                if channel.is_connected() {
                    return Either::A(future::ok(channel.clone()));
                }
            }
            Either::B(channel::connect(config).map(move |channel| {
                *slot = Some(channel.clone());
                channel
            }))
        })
}

fn stepped_volume(
    channel: Channel,
    target: f64,
) -> impl Future<Item = receiver::Status, Error = Error> {
    channel.receiver_status().and_then(
        move |status| -> Box<dyn Future<Item = receiver::Status, Error = Error> + Send> {
            match status.volume.control_type {
                Some(VolumeControlType::Fixed) => Box::new(future::err(Error::FixedVolume)),
                Some(VolumeControlType::Master) => {
                    let step = status.volume.step_interval.unwrap_or(DEFAULT_VOLUME_STEP);
                    let current = status.volume.level.unwrap_or(0.0);
                    if (target - current).abs() <= step {
                        Box::new(channel.set_receiver_volume(Volume::from(target)))
                    } else {
                        Box::new(ramp(channel, target, step))
                    }
                }
                _ => Box::new(channel.set_receiver_volume(Volume::from(target))),
            }
        },
    )
}

/// Walk the device volume toward `target` one advertised step at a time.
/// Each iteration re-reads the device's reported level before computing the
/// next increment rather than trusting the previously requested value.
fn ramp(
    channel: Channel,
    target: f64,
    step: f64,
) -> impl Future<Item = receiver::Status, Error = Error> {
    future::loop_fn((channel, MAX_RAMP_STEPS), move |(channel, remaining)| {
        let stepper = channel.clone();
        channel.receiver_status().and_then(
            move |status| -> Box<
                dyn Future<Item = Loop<receiver::Status, (Channel, usize)>, Error = Error> + Send,
            > {
                let current = status.volume.level.unwrap_or(0.0);
                let delta = target - current;
                if delta.abs() <= step {
                    Box::new(
                        stepper
                            .set_receiver_volume(Volume::from(target))
                            .map(Loop::Break),
                    )
                } else if remaining == 0 {
                    warn!("volume ramp did not converge on {}", stepper.name());
                    Box::new(future::err(Error::Timeout))
                } else {
                    let next = if delta > 0.0 {
                        current + step
                    } else {
                        current - step
                    };
                    Box::new(
                        stepper
                            .set_receiver_volume(Volume::from(next))
                            .map(move |_| Loop::Continue((stepper, remaining - 1))),
                    )
                }
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};

    use super::{clamp_level, name, CastDevice};
    use crate::discovery::{Capabilities, ServiceRecord};

    fn record(txt: &[(&str, &str)]) -> ServiceRecord {
        ServiceRecord {
            dns_name: "Chromecast-4ae1b8c2.local".to_owned(),
            ipv4: Some(Ipv4Addr::new(192, 168, 1, 12)),
            ipv6: None,
            port: 8009,
            txt: txt
                .iter()
                .map(|&(k, v)| (k.to_owned(), v.to_owned()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn clamp_bounds_volume_level() {
        assert_eq!(0.0, clamp_level(-1.0));
        assert_eq!(1.0, clamp_level(2.5));
        assert_eq!(0.4, clamp_level(0.4));
    }

    #[test]
    fn base_name_strips_hex_serial() {
        assert_eq!(Some("Chromecast".to_owned()), name::base_name("Chromecast-f4e8"));
        assert_eq!(
            Some("Chromecast".to_owned()),
            name::base_name("  Chromecast-4AE1b8 ")
        );
        assert_eq!(Some("Chromecast".to_owned()), name::base_name("Chromecast-"));
        assert_eq!(None, name::base_name("Chromecast-Ultra-f4"));
        assert_eq!(None, name::base_name("Living Room"));
    }

    #[test]
    fn display_name_prefers_friendly_name() {
        let device = CastDevice::new("Chromecast-abc1", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_friendly_name("Kitchen")
            .with_model_name("Chromecast Audio");
        assert_eq!("Kitchen (Chromecast Audio)", device.display_name());
    }

    #[test]
    fn display_name_falls_back_to_dns_base() {
        let device = CastDevice::new("Chromecast-abc1", IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!("Chromecast", device.display_name());
    }

    #[test]
    fn display_name_placeholder_when_nothing_matches() {
        let device = CastDevice::new("no match here", IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!("Unidentified cast device", device.display_name());
    }

    #[test]
    fn display_name_skips_duplicate_model() {
        let device = CastDevice::new("x", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_friendly_name("Chromecast")
            .with_model_name("Chromecast");
        assert_eq!("Chromecast", device.display_name());
    }

    #[test]
    fn from_record_applies_txt_defaults() {
        let device = CastDevice::from_record(&record(&[("ve", ""), ("fn", "Den TV")])).unwrap();
        assert_eq!(-1, device.protocol_version());
        assert_eq!(Capabilities::new(0), device.capabilities());
        assert_eq!(Some("Den TV"), device.friendly_name());
        assert_eq!("Den TV", device.display_name());
        assert_eq!(8009, device.port());
    }

    #[test]
    fn from_record_requires_an_address() {
        let mut record = record(&[]);
        record.ipv4 = None;
        assert!(CastDevice::from_record(&record).is_err());
    }

    #[test]
    fn from_record_parses_capabilities_and_version() {
        let device =
            CastDevice::from_record(&record(&[("ca", "4101"), ("ve", "05"), ("id", "uuid-1")]))
                .unwrap();
        assert_eq!(5, device.protocol_version());
        assert!(device.capabilities().has(Capabilities::VIDEO_OUT));
        assert_eq!(Some("uuid-1"), device.unique_id());
    }
}
