#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;

/// Detachment support for spawned commands: the game should survive the
/// embedding launcher closing.
/// On Windows this uses CREATE_NEW_PROCESS_GROUP (plus no console window);
/// on Unix a new session via setsid.
pub trait CommandDetachExt {
    fn detach(&mut self) -> &mut Self;
}

impl CommandDetachExt for tokio::process::Command {
    fn detach(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            self.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
        }
        #[cfg(unix)]
        {
            unsafe {
                self.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }
        self
    }
}
