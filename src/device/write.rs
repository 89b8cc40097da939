use log::Level;
use std::time::{Duration, Instant};

use super::Device;
use crate::backend::{Capability, Handle, WriteKind};
use crate::error::{Error, ErrorKind};
use crate::inbox::Inbox;
use crate::uuid::Uuid;

/// Options of [`Device::write_with_options`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteOptions {
    wait_for_response: bool,
    packets: usize,
    response_characteristic: Option<Uuid>,
    timeout: Option<Duration>,
    kind: Option<WriteKind>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the response after the write.
    ///
    /// With a notification inbox the write blocks until the response packets arrive. Without
    /// one, waiting means an acknowledged write request: the call returns once the device has
    /// acknowledged the write, and observers get notifications from the listener instead.
    pub fn wait_for_response(mut self, v: bool) -> Self {
        self.wait_for_response = v;
        self
    }

    /// Number of notification packets making up the response. Must not be zero when waiting.
    pub fn packets(mut self, v: usize) -> Self {
        self.packets = v;
        self
    }

    /// Characteristic the response arrives on. Defaults to the written one.
    pub fn response_characteristic(mut self, uuid: Uuid) -> Self {
        self.response_characteristic = Some(uuid);
        self
    }

    /// How long to wait for the response. Defaults to
    /// [`Config::response_timeout`](super::Config::response_timeout).
    pub fn timeout(mut self, v: Duration) -> Self {
        self.timeout = Some(v);
        self
    }

    /// Overrides the ATT write type. By default a write is a request, except on backends
    /// without a notification inbox where it is a command unless waiting for the response.
    pub fn kind(mut self, v: WriteKind) -> Self {
        self.kind = Some(v);
        self
    }

    fn resolve_kind(&self, has_inbox: bool) -> WriteKind {
        match self.kind {
            Some(kind) => kind,
            None if self.wait_for_response || has_inbox => WriteKind::WithResponse,
            None => WriteKind::WithoutResponse,
        }
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            wait_for_response: false,
            packets: 1,
            response_characteristic: None,
            timeout: None,
            kind: None,
        }
    }
}

struct Response<'a> {
    inbox: &'a Inbox,
    uuid: Uuid,
    handle: Handle,
}

impl Device {
    pub fn write(&self, uuid: Uuid, value: &[u8]) -> Result<(), Error> {
        self.write_with_options(uuid, value, &WriteOptions::new())
    }

    /// Writes `value` to a characteristic.
    ///
    /// If the options ask to wait for a response, the call then blocks until the configured
    /// number of packets has been queued on the response characteristic, concatenates them in
    /// arrival order and hands the result to that characteristic's observers. The reassembled
    /// value isn't returned. If the packets don't arrive in time the call fails with
    /// [`ErrorKind::NoResponse`] and the packets received so far stay queued.
    pub fn write_with_options(&self, uuid: Uuid, value: &[u8], options: &WriteOptions) -> Result<(), Error> {
        device_log!(self, Level::Info, "write {}", uuid);
        let has_inbox = self.backend.capabilities().contains(Capability::NotificationInbox);
        let inbox = if options.wait_for_response {
            if options.packets == 0 {
                return Err(Error::new(ErrorKind::InvalidArgument,
                    "expected packet count must be greater than 0"));
            }
            if has_inbox {
                Some(self.backend.inbox()
                    .ok_or_else(|| Error::unsupported("waiting for a response"))?)
            } else {
                None
            }
        } else {
            None
        };

        let handle = self.resolve(uuid)?;
        let response = match inbox {
            Some(inbox) => {
                let uuid = options.response_characteristic.unwrap_or(uuid);
                Some(Response {
                    inbox,
                    uuid,
                    handle: self.resolve(uuid)?,
                })
            }
            None => None,
        };

        self.backend.write_characteristic(handle, value, options.resolve_kind(has_inbox))
            .map_err(|e| e.reclassify(ErrorKind::WriteFailed))?;

        if let Some(response) = response {
            let timeout = options.timeout.unwrap_or(self.config.response_timeout);
            let value = self.await_response(&response, options.packets, timeout)?;
            self.dispatcher().dispatch(response.uuid, &value);
        }
        Ok(())
    }

    fn await_response(&self, response: &Response, packets: usize, timeout: Duration) -> Result<Vec<u8>, Error> {
        let started = Instant::now();
        loop {
            if let Some(parts) = response.inbox.take(response.handle, packets) {
                device_log!(self, Level::Debug, "{} packets received on {} after {:?}",
                    packets, response.handle, started.elapsed());
                return Ok(parts.concat());
            }
            let waited = started.elapsed();
            if waited >= timeout {
                device_log!(self, Level::Warn, "no response on {} after {:?} ({}/{} packets)",
                    response.handle, waited, response.inbox.len(response.handle), packets);
                return Err(Error::no_response(waited));
            }
            let quantum = self.config.poll_interval.min(timeout - waited);
            response.inbox.wait(response.handle, packets, quantum);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::BackendKind;
    use crate::mock::MockBackend;
    use hex_literal::hex;
    use std::sync::{Arc, Mutex};

    const TX: Handle = Handle(0x0e);
    const RX: Handle = Handle(0x10);

    fn tx() -> Uuid {
        Uuid::from_bytes(hex!("6e400002b5a3f393e0a9e50e24dcca9e"))
    }

    fn rx() -> Uuid {
        Uuid::from_bytes(hex!("6e400003b5a3f393e0a9e50e24dcca9e"))
    }

    fn mock(kind: BackendKind) -> MockBackend {
        MockBackend::new(kind)
            .characteristic(tx(), TX)
            .characteristic(rx(), RX)
    }

    fn device(mock: &MockBackend) -> Device {
        Device::new("01:23:45:67:89:AB", mock.clone()).unwrap()
    }

    fn recorder(device: &Device, uuid: Uuid) -> Arc<Mutex<Vec<Vec<u8>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        device.subscribe_with_observer(uuid, false, move |v: &[u8]| s.lock().unwrap().push(v.to_vec()))
            .unwrap();
        seen
    }

    fn wait_options(packets: usize, timeout: Duration) -> WriteOptions {
        WriteOptions::new()
            .wait_for_response(true)
            .packets(packets)
            .response_characteristic(rx())
            .timeout(timeout)
    }

    #[test]
    fn plain_write() {
        let mock = mock(BackendKind::Bled112);
        let dev = device(&mock);
        dev.write(tx(), &[1, 2]).unwrap();
        dev.write_with_options(tx(), &[3], &WriteOptions::new().kind(WriteKind::WithoutResponse))
            .unwrap();
        assert_eq!(mock.writes(), vec![
            (TX, vec![1, 2], WriteKind::WithResponse),
            (TX, vec![3], WriteKind::WithoutResponse),
        ]);
    }

    #[test]
    fn write_kind_without_inbox() {
        let mock = mock(BackendKind::Gatttool);
        let dev = device(&mock);
        dev.write(tx(), &[1]).unwrap();
        dev.write_with_options(tx(), &[2], &wait_options(2, Duration::from_secs(1))).unwrap();
        dev.write_with_options(tx(), &[3], &WriteOptions::new().kind(WriteKind::WithResponse))
            .unwrap();
        assert_eq!(mock.writes(), vec![
            (TX, vec![1], WriteKind::WithoutResponse),
            (TX, vec![2], WriteKind::WithResponse),
            (TX, vec![3], WriteKind::WithResponse),
        ]);
        // The response characteristic isn't resolved and nothing is awaited.
        assert_eq!(mock.calls(), vec!["handle", "write_characteristic", "handle", "write_characteristic",
            "handle", "write_characteristic"]);
    }

    #[test]
    fn reassembles_response() {
        let mock = mock(BackendKind::Bled112)
            .respond(TX, RX, vec![vec![0x01, 0x02], vec![0x03, 0x04]], Duration::from_millis(50));
        let dev = device(&mock);
        let first = recorder(&dev, rx());
        let second = recorder(&dev, rx());

        dev.write_with_options(tx(), &[0xaa], &wait_options(2, Duration::from_secs(1))).unwrap();

        assert_eq!(*first.lock().unwrap(), vec![vec![0x01, 0x02, 0x03, 0x04]]);
        assert_eq!(*second.lock().unwrap(), vec![vec![0x01, 0x02, 0x03, 0x04]]);
        assert_eq!(mock.notifications().len(RX), 0);
    }

    #[test]
    fn leaves_extra_packets_queued() {
        let mock = mock(BackendKind::Bled112);
        mock.deliver(RX, vec![1]);
        mock.deliver(RX, vec![2]);
        mock.deliver(RX, vec![3]);
        let dev = device(&mock);
        let seen = recorder(&dev, rx());

        dev.write_with_options(tx(), &[0xaa], &wait_options(2, Duration::from_secs(1))).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![vec![1, 2]]);
        assert_eq!(mock.notifications().take(RX, 1), Some(vec![vec![3]]));
    }

    #[test]
    fn response_defaults_to_written_characteristic() {
        let mock = mock(BackendKind::Bled112)
            .respond(TX, TX, vec![vec![7]], Duration::from_millis(10));
        let dev = device(&mock);
        let seen = recorder(&dev, tx());

        dev.write_with_options(tx(), &[0], &WriteOptions::new().wait_for_response(true)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![vec![7]]);
    }

    #[test]
    fn times_out() {
        let mock = mock(BackendKind::Bled112);
        mock.deliver(RX, vec![1]);
        let dev = device(&mock);
        let seen = recorder(&dev, rx());

        let started = Instant::now();
        let e = dev.write_with_options(tx(), &[0xaa], &wait_options(2, Duration::from_secs(1)))
            .unwrap_err();
        let took = started.elapsed();

        assert_eq!(e.kind(), ErrorKind::NoResponse);
        let elapsed = e.elapsed().unwrap();
        assert!(elapsed >= Duration::from_secs(1), "{:?}", elapsed);
        assert!(took < Duration::from_secs(1) + POLL_SLACK, "{:?}", took);
        assert!(seen.lock().unwrap().is_empty());
        // The partial response stays queued.
        assert_eq!(mock.notifications().len(RX), 1);
        assert_eq!(mock.writes().len(), 1);
    }

    const POLL_SLACK: Duration = Duration::from_millis(250);

    #[test]
    fn zero_packets_is_rejected_before_io() {
        let mock = mock(BackendKind::Bled112);
        let dev = device(&mock);
        let e = dev.write_with_options(tx(), &[0xaa], &wait_options(0, Duration::from_secs(1)))
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn unknown_characteristics() {
        let mock = mock(BackendKind::Bled112);
        let dev = device(&mock);
        let unknown = Uuid::from_u16(0x2a00);

        let e = dev.write(unknown, &[0]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidIdentifier);

        let e = dev.write_with_options(tx(), &[0],
            &WriteOptions::new().wait_for_response(true).response_characteristic(unknown))
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidIdentifier);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn rejected_write() {
        let mock = mock(BackendKind::Bled112).reject_writes(TX);
        let dev = device(&mock);
        let seen = recorder(&dev, rx());
        let e = dev.write_with_options(tx(), &[0], &wait_options(1, Duration::from_secs(1)))
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::WriteFailed);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn panicking_observer_is_isolated() {
        let mock = mock(BackendKind::Bled112);
        mock.deliver(RX, vec![5]);
        let dev = device(&mock);
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let order = order.clone();
            dev.subscribe_with_observer(rx(), false, move |_: &[u8]| {
                order.lock().unwrap().push("first");
                panic!("observer failure");
            }).unwrap();
        }
        {
            let order = order.clone();
            dev.subscribe_with_observer(rx(), false, move |_: &[u8]| {
                order.lock().unwrap().push("second");
            }).unwrap();
        }

        dev.write_with_options(tx(), &[0], &wait_options(1, Duration::from_secs(1))).unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn removed_observer_is_not_called() {
        let mock = mock(BackendKind::Bled112);
        mock.deliver(RX, vec![5]);
        let dev = device(&mock);
        let seen = Arc::new(Mutex::new(0));
        let s = seen.clone();
        let id = dev.subscribe_with_observer(rx(), true, move |_: &[u8]| *s.lock().unwrap() += 1)
            .unwrap();
        assert!(dev.remove_observer(id));
        assert_eq!(dev.observer_count(rx()), 0);

        dev.write_with_options(tx(), &[0], &wait_options(1, Duration::from_secs(1))).unwrap();

        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(mock.notifications().len(RX), 0);
    }
}
