//! Local IPC endpoint
//!
//! Windows uses a named pipe (`\\.\pipe\<name>`) whose DACL lets any
//! authenticated user connect. Other platforms use a Unix domain socket in the
//! temp directory with mode `0o666`, which is enough for development hosts.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(windows)]
pub use self::windows_pipe::{ClientStream, Connection, EndpointListener};

#[cfg(unix)]
pub use self::unix_socket::{ClientStream, Connection, EndpointListener};

/// Address of the service endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    address: PathBuf,
}

impl Endpoint {
    /// Endpoint for a well-known name such as `IpChangerPipe`
    pub fn from_name(name: &str) -> Self {
        #[cfg(windows)]
        let address = PathBuf::from(format!(r"\\.\pipe\{}", name));
        #[cfg(not(windows))]
        let address = std::env::temp_dir().join(format!("{}.sock", name));

        Self { address }
    }

    /// Endpoint at an explicit pipe or socket path
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            address: path.into(),
        }
    }

    pub fn address(&self) -> &Path {
        &self.address
    }

    /// Create the listening side of the endpoint
    pub fn bind(&self) -> io::Result<EndpointListener> {
        EndpointListener::bind(&self.address)
    }

    /// Open a client connection; see [`ClientStream`]
    pub async fn connect(&self) -> io::Result<ClientStream> {
        connect(&self.address).await
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address.display())
    }
}

/// Pipe DACL: read/write for authenticated users, full control for SYSTEM
/// and Administrators.
///
/// The AU mask is `FILE_GENERIC_READ | FILE_GENERIC_WRITE` without
/// `FILE_CREATE_PIPE_INSTANCE` (0x4), so only the service can create
/// instances of the pipe. `GW` would include that right.
#[cfg_attr(not(windows), allow(dead_code))]
const PIPE_SDDL: &str = "D:(A;;0x12019b;;;AU)(A;;GA;;;SY)(A;;GA;;;BA)";

#[cfg(unix)]
use self::unix_socket::connect;

#[cfg(windows)]
use self::windows_pipe::connect;

#[cfg(unix)]
mod unix_socket {
    use std::io;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tokio::net::{UnixListener, UnixStream};

    pub type Connection = UnixStream;
    pub type ClientStream = UnixStream;

    pub struct EndpointListener {
        listener: UnixListener,
        path: PathBuf,
    }

    impl EndpointListener {
        /// Bind and set the mode inside a private directory, then rename the
        /// socket into place. The rename also replaces a stale socket left by
        /// a previous run.
        pub(super) fn bind(path: &Path) -> io::Result<Self> {
            let parent = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }

            let staging = tempfile::Builder::new()
                .prefix(".ipchanger-")
                .tempdir_in(parent)?;
            let staged = staging.path().join("endpoint.sock");

            let listener = UnixListener::bind(&staged)?;
            std::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o666))?;
            std::fs::rename(&staged, path)?;

            Ok(Self {
                listener,
                path: path.to_path_buf(),
            })
        }

        pub async fn accept(&mut self) -> io::Result<Connection> {
            let (stream, _) = self.listener.accept().await?;
            Ok(stream)
        }
    }

    impl Drop for EndpointListener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub(super) async fn connect(path: &Path) -> io::Result<ClientStream> {
        UnixStream::connect(path).await
    }
}

#[cfg(windows)]
mod windows_pipe {
    use std::ffi::c_void;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };
    use windows::core::{HSTRING, PCWSTR};
    use windows::Win32::Foundation::{LocalFree, HLOCAL};
    use windows::Win32::Security::Authorization::{
        ConvertStringSecurityDescriptorToSecurityDescriptorW, SDDL_REVISION_1,
    };
    use windows::Win32::Security::{PSECURITY_DESCRIPTOR, SECURITY_ATTRIBUTES};

    use super::PIPE_SDDL;

    pub type Connection = NamedPipeServer;
    pub type ClientStream = NamedPipeClient;

    const ERROR_PIPE_BUSY: i32 = 231;
    const BUSY_RETRY_DELAY: Duration = Duration::from_millis(50);

    /// Self-relative security descriptor allocated by the OS
    struct PipeSecurity {
        descriptor: PSECURITY_DESCRIPTOR,
    }

    // The descriptor is immutable after creation and owned by this value.
    unsafe impl Send for PipeSecurity {}

    impl PipeSecurity {
        fn from_sddl(sddl: &str) -> io::Result<Self> {
            let sddl = HSTRING::from(sddl);
            let mut descriptor = PSECURITY_DESCRIPTOR::default();
            unsafe {
                ConvertStringSecurityDescriptorToSecurityDescriptorW(
                    PCWSTR(sddl.as_ptr()),
                    SDDL_REVISION_1,
                    &mut descriptor,
                    None,
                )
                .map_err(io::Error::other)?;
            }
            Ok(Self { descriptor })
        }

        fn attributes(&self) -> SECURITY_ATTRIBUTES {
            SECURITY_ATTRIBUTES {
                nLength: std::mem::size_of::<SECURITY_ATTRIBUTES>() as u32,
                lpSecurityDescriptor: self.descriptor.0,
                bInheritHandle: false.into(),
            }
        }
    }

    impl Drop for PipeSecurity {
        fn drop(&mut self) {
            unsafe {
                let _ = LocalFree(Some(HLOCAL(self.descriptor.0)));
            }
        }
    }

    pub struct EndpointListener {
        address: PathBuf,
        security: PipeSecurity,
        next: Option<NamedPipeServer>,
    }

    impl EndpointListener {
        pub(super) fn bind(address: &Path) -> io::Result<Self> {
            let mut listener = Self {
                address: address.to_path_buf(),
                security: PipeSecurity::from_sddl(PIPE_SDDL)?,
                next: None,
            };
            // Fails if another process already owns the pipe name
            listener.next = Some(listener.create_instance(true)?);
            Ok(listener)
        }

        fn create_instance(&self, first: bool) -> io::Result<NamedPipeServer> {
            let mut attributes = self.security.attributes();
            unsafe {
                ServerOptions::new()
                    .first_pipe_instance(first)
                    .create_with_security_attributes_raw(
                        &self.address,
                        &mut attributes as *mut SECURITY_ATTRIBUTES as *mut c_void,
                    )
            }
        }

        /// Wait for a client on the pending instance, then offer a fresh
        /// instance for the next client before returning.
        pub async fn accept(&mut self) -> io::Result<Connection> {
            let server = match self.next.take() {
                Some(server) => server,
                None => self.create_instance(false)?,
            };

            server.connect().await?;

            match self.create_instance(false) {
                Ok(next) => self.next = Some(next),
                // Retried on the next accept
                Err(e) => tracing::warn!(error = %e, "Failed to create next pipe instance"),
            }

            Ok(server)
        }
    }

    pub(super) async fn connect(address: &Path) -> io::Result<ClientStream> {
        loop {
            match ClientOptions::new().open(address) {
                Ok(client) => return Ok(client),
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {}
                Err(e) => return Err(e),
            }
            tokio::time::sleep(BUSY_RETRY_DELAY).await;
        }
    }
}
