//! Virtual connections to a running receiver application and the
//! media-control operations scoped to them.
//!
//! A `Session` is bound to an application's transport id (its message
//! destination) and session id (its run identifier). It does not own the
//! [`Channel`]; it holds a handle, and the channel's session set tracks only
//! destination ids, so dropping either side never leaks the other.
//!
//! [`Channel`]: ../channel/struct.Channel.html

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future;
use futures::prelude::*;
use serde_json::Value;

use crate::channel::Channel;
use crate::error::Error;
use crate::event::{Event, EventType};
use crate::message::{self, MessageBuilder};
use crate::payload::connection;
use crate::payload::media;
use crate::payload::receiver::{Application, Volume};

type CloseListener = Box<dyn FnOnce() + Send>;

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("app_id", &self.app_id)
            .field("session_id", &self.session_id)
            .field("destination", &self.destination)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A live connection to one receiver application.
pub struct Session {
    channel: Channel,
    app_id: String,
    session_id: String,
    destination: String,
    closed: Arc<AtomicBool>,
    on_close: Arc<Mutex<Option<CloseListener>>>,
}

impl Session {
    /// Bind a session to a running application. Spawns a watcher that marks
    /// the session closed (and fires the closed-by-peer listener) when the
    /// peer closes the virtual connection or the channel goes down.
    pub(crate) fn new(channel: &Channel, application: &Application) -> Self {
        let session = Session {
            channel: channel.clone(),
            app_id: application.app_id.clone(),
            session_id: application.session_id.clone(),
            destination: application.transport_id.clone(),
            closed: Arc::new(AtomicBool::new(false)),
            on_close: Arc::new(Mutex::new(None)),
        };

        let closed = Arc::clone(&session.closed);
        let on_close = Arc::clone(&session.on_close);
        let destination = session.destination.clone();
        let events = channel.subscribe(Some(&[EventType::SessionClosed, EventType::Connected]));
        tokio_executor::spawn(
            events
                .for_each(move |event| {
                    let fired = match event {
                        Event::SessionClosed { ref peer } => *peer == destination,
                        Event::Connected(false) => true,
                        _ => false,
                    };
                    if !fired {
                        return Ok(());
                    }
                    if !closed.swap(true, Ordering::SeqCst) {
                        if let Ok(mut slot) = on_close.lock() {
                            if let Some(listener) = slot.take() {
                                listener();
                            }
                        }
                    }
                    // The session is gone; the watcher's work is done.
                    Err(())
                })
                .then(|_| Ok(())),
        );
        session
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Transport id of the application; the destination of every message
    /// this session sends.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Register a callback invoked at most once, and only when the session
    /// is closed by the peer or by the channel going down (not by a local
    /// `close`).
    pub fn on_close<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Ok(mut slot) = self.on_close.lock() {
            *slot = Some(Box::new(listener));
        }
    }

    fn guard(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::NoApplicationRunning);
        }
        Ok(())
    }

    /// `LOAD` media into the application. With `synchronous` the device's
    /// first `MEDIA_STATUS` is returned; otherwise the frame is written
    /// fire-and-forget and `None` comes back.
    pub fn load(
        &self,
        media: media::Media,
        autoplay: bool,
        current_time: f64,
        custom_data: Option<Value>,
        synchronous: bool,
    ) -> Box<dyn Future<Item = Option<media::Status>, Error = Error> + Send> {
        if let Err(err) = self.guard() {
            return Box::new(future::err(err));
        }
        let request_id = self.channel.next_request_id();
        let payload = media::Request::Load {
            request_id,
            session_id: self.session_id.clone(),
            media,
            autoplay: Some(autoplay),
            current_time: Some(current_time),
            custom_data,
        };
        if !synchronous {
            return Box::new(
                self.channel
                    .media_fire(&self.destination, payload)
                    .map(|()| None),
            );
        }
        Box::new(
            self.channel
                .media_request(&self.destination, request_id, payload)
                .map(|status| status.into_iter().next()),
        )
    }

    pub fn play(
        &self,
        media_session_id: i64,
    ) -> Box<dyn Future<Item = media::Status, Error = Error> + Send> {
        self.media_op(|request_id| media::Request::Play {
            media_session_id,
            request_id,
        })
    }

    pub fn pause(
        &self,
        media_session_id: i64,
    ) -> Box<dyn Future<Item = media::Status, Error = Error> + Send> {
        self.media_op(|request_id| media::Request::Pause {
            media_session_id,
            request_id,
        })
    }

    /// Media-namespace `STOP`, scoped to a media session. Distinct from the
    /// receiver-level application stop.
    pub fn stop(
        &self,
        media_session_id: i64,
    ) -> Box<dyn Future<Item = media::Status, Error = Error> + Send> {
        self.media_op(|request_id| media::Request::Stop {
            media_session_id,
            request_id,
        })
    }

    pub fn seek(
        &self,
        media_session_id: i64,
        current_time: f64,
        resume_state: Option<media::ResumeState>,
    ) -> Box<dyn Future<Item = media::Status, Error = Error> + Send> {
        self.media_op(|request_id| media::Request::Seek {
            media_session_id,
            request_id,
            resume_state,
            current_time: Some(current_time),
        })
    }

    /// Media-stream `SET_VOLUME`, scoped to a media session. Distinct from
    /// the device volume.
    pub fn set_volume(
        &self,
        media_session_id: i64,
        volume: Volume,
    ) -> Box<dyn Future<Item = media::Status, Error = Error> + Send> {
        self.media_op(move |request_id| media::Request::SetVolume {
            media_session_id,
            request_id,
            volume,
        })
    }

    /// Fetch the newest media status for this session.
    pub fn get_media_status(
        &self,
    ) -> Box<dyn Future<Item = Option<media::Status>, Error = Error> + Send> {
        if let Err(err) = self.guard() {
            return Box::new(future::err(err));
        }
        let request_id = self.channel.next_request_id();
        let payload = media::Request::GetStatus {
            media_session_id: None,
            request_id,
        };
        Box::new(
            self.channel
                .media_request(&self.destination, request_id, payload)
                .map(|status| status.into_iter().next()),
        )
    }

    fn media_op<F>(&self, build: F) -> Box<dyn Future<Item = media::Status, Error = Error> + Send>
    where
        F: FnOnce(i64) -> media::Request,
    {
        if let Err(err) = self.guard() {
            return Box::new(future::err(err));
        }
        let request_id = self.channel.next_request_id();
        let payload = build(request_id);
        Box::new(
            self.channel
                .media_request(&self.destination, request_id, payload)
                .and_then(newest_status),
        )
    }

    /// Close the session locally: send CLOSE to the application and forget
    /// the virtual connection. The closed-by-peer listener does not fire.
    pub fn close(&self) -> Box<dyn Future<Item = (), Error = Error> + Send> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Box::new(future::ok(()));
        }
        let close = MessageBuilder::default()
            .namespace(message::NAMESPACE_CONNECTION)
            .source(self.channel.sender_id())
            .destination(&self.destination)
            .payload(&connection::Request::Close)
            .into_message();
        let channel = self.channel.clone();
        let destination = self.destination.clone();
        debug!("closing session {} to {}", self.session_id, destination);
        Box::new(future::result(channel.send(close)).and_then(move |()| {
            channel.forget_session(destination).then(|_| Ok(()))
        }))
    }
}

fn newest_status(status: Vec<media::Status>) -> Result<media::Status, Error> {
    status.into_iter().next().ok_or(Error::NoApplicationRunning)
}

#[cfg(test)]
mod tests {
    use super::newest_status;
    use crate::error::Error;
    use crate::payload::media;

    #[test]
    fn newest_status_takes_the_first_entry() {
        let status: Vec<media::Status> = serde_json::from_str(
            r#"[{"mediaSessionId":5,"playerState":"PLAYING"},
                {"mediaSessionId":6,"playerState":"IDLE"}]"#,
        )
        .unwrap();
        assert_eq!(5, newest_status(status).unwrap().media_session_id);
    }

    #[test]
    fn empty_status_means_no_application() {
        match newest_status(Vec::new()) {
            Err(Error::NoApplicationRunning) => {}
            result => panic!("unexpected result: {:?}", result),
        }
    }
}
