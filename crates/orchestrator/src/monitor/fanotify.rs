#![forbid(unsafe_code)]

use crate::error::Error;
use crate::monitor::classify::mask;
use crate::monitor::{EventSource, SubscriptionFactory};
use config::{Config, MarkScope};
use nix::errno::Errno;
use nix::sys::fanotify::{EventFFlags, Fanotify, InitFlags, MarkFlags, MaskFlags};
use std::os::fd::AsFd;
use std::path::Path;
use tracing::{trace, warn};

// FAN_REPORT_FID | FAN_REPORT_DFID_NAME. Directory entry events (create,
// delete, moves) are only delivered to groups reporting file identities, and
// such groups never hand out open descriptors.
const REPORT_FID: u32 = 0x0000_0200;
const REPORT_DFID_NAME: u32 = 0x0000_0C00;

/// Subscribes through the Linux fanotify API.
#[derive(Debug, Clone)]
pub struct FanotifyFactory {
    scope: MarkScope,
}

impl FanotifyFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            scope: config.monitor.mark_scope,
        }
    }

    fn mark_flags(&self) -> MarkFlags {
        match self.scope {
            MarkScope::Filesystem => MarkFlags::FAN_MARK_ADD | MarkFlags::FAN_MARK_FILESYSTEM,
            MarkScope::Inode => MarkFlags::FAN_MARK_ADD,
        }
    }

    fn mark(&self, fan: &Fanotify, mount: &Path) -> Result<(), Error> {
        let dir = std::fs::File::open(mount).map_err(|err| Error::SubscriptionMark {
            path: mount.to_path_buf(),
            reason: err.to_string(),
        })?;

        let flags = self.mark_flags();
        let result = fan.mark(
            flags,
            MaskFlags::from_bits_retain(mask::WATCH),
            &dir,
            None::<&Path>,
        );
        let result = match result {
            // FAN_RENAME needs Linux 5.17. Older kernels still report the
            // rename as a moved-from/moved-to pair.
            Err(Errno::EINVAL) => {
                warn!(mount = %mount.display(), "kernel rejected FAN_RENAME, watching without it");
                fan.mark(
                    flags,
                    MaskFlags::from_bits_retain(mask::WATCH & !mask::FAN_RENAME),
                    &dir,
                    None::<&Path>,
                )
            }
            other => other,
        };

        result.map_err(|err| Error::SubscriptionMark {
            path: mount.to_path_buf(),
            reason: err.to_string(),
        })
    }
}

impl SubscriptionFactory for FanotifyFactory {
    fn subscribe(&self, mount: &Path) -> Result<Box<dyn EventSource>, Error> {
        let fan = Fanotify::init(
            InitFlags::FAN_CLOEXEC
                | InitFlags::FAN_CLASS_NOTIF
                | InitFlags::FAN_NONBLOCK
                | InitFlags::from_bits_retain(REPORT_FID | REPORT_DFID_NAME),
            EventFFlags::O_RDONLY | EventFFlags::O_CLOEXEC | EventFFlags::O_LARGEFILE,
        )
        .map_err(|err| Error::SubscriptionInit(format!("{err} (need CAP_SYS_ADMIN)")))?;

        self.mark(&fan, mount)?;
        trace!(mount = %mount.display(), "fanotify mark applied");
        Ok(Box::new(FanotifySource { fan }))
    }
}

struct FanotifySource {
    fan: Fanotify,
}

impl EventSource for FanotifySource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match nix::unistd::read(self.fan.as_fd(), buf) {
            Ok(n) => Ok(n),
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(0),
            Err(err) => Err(Error::SubscriptionRead(err.to_string())),
        }
    }

    fn close(self: Box<Self>) -> Result<(), Error> {
        // The descriptor is closed when the group is dropped.
        drop(self.fan);
        trace!("fanotify descriptor released");
        Ok(())
    }
}
