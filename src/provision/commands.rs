//! Shell commands run on the control host.
//!
//! Every configurable value is escaped before interpolation; addresses are
//! parsed [`IpAddr`] values and never need escaping.

use std::net::{IpAddr, SocketAddr};

use shell_escape::unix::escape;

/// Name of the provider CLI once installed on the control host.
pub const REMOTE_MACHINE_BIN: &str = "docker-machine";

const REMOTE_MACHINE_PATH: &str = "/usr/local/bin/docker-machine";
const SWARM_PORT: u16 = 2377;
const LISTENER_SERVICE: &str = "swarm-listener";
const LISTENER_IMAGE: &str = "dockerflow/docker-flow-swarm-listener";
const PROXY_SERVICE: &str = "proxy";
const PROXY_IMAGE: &str = "dockerflow/docker-flow-proxy";
const APP_SERVICE: &str = "app";
/// Longest wait for the application container after `docker stack deploy`.
const APP_START_TIMEOUT_SECS: u32 = 300;
const APP_POLL_SECS: u32 = 5;

fn join_escaped(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| escape((*part).into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(super) fn install_tooling(download_url: &str) -> String {
    format!(
        "curl -fsSL {} -o /tmp/docker-machine && install -m 0755 /tmp/docker-machine {REMOTE_MACHINE_PATH}",
        escape(download_url.into())
    )
}

/// Initialises the swarm on the control host and joins the swarm host. The
/// join token is read on the control host before the join command is sent.
pub(super) fn init_cluster(control_address: IpAddr, swarm_host: &str) -> String {
    let manager = SocketAddr::new(control_address, SWARM_PORT);
    format!(
        "docker swarm init --advertise-addr {control_address} && {REMOTE_MACHINE_BIN} ssh {} \
         \"docker swarm join --token $(docker swarm join-token -q worker) {manager}\"",
        escape(swarm_host.into())
    )
}

pub(super) fn create_network(network: &str) -> String {
    join_escaped(&[
        "docker",
        "network",
        "create",
        "--driver",
        "overlay",
        "--attachable",
        network,
    ])
}

pub(super) fn deploy_listener(network: &str) -> String {
    let create_url = format!(
        "DF_NOTIFY_CREATE_SERVICE_URL=http://{PROXY_SERVICE}:8080/v1/docker-flow-proxy/reconfigure"
    );
    let remove_url = format!(
        "DF_NOTIFY_REMOVE_SERVICE_URL=http://{PROXY_SERVICE}:8080/v1/docker-flow-proxy/remove"
    );
    join_escaped(&[
        "docker",
        "service",
        "create",
        "--name",
        LISTENER_SERVICE,
        "--network",
        network,
        "--mount",
        "type=bind,source=/var/run/docker.sock,target=/var/run/docker.sock",
        "-e",
        &create_url,
        "-e",
        &remove_url,
        "--constraint",
        "node.role==manager",
        LISTENER_IMAGE,
    ])
}

pub(super) fn deploy_proxy(network: &str) -> String {
    let listener = format!("LISTENER_ADDRESS={LISTENER_SERVICE}");
    join_escaped(&[
        "docker",
        "service",
        "create",
        "--name",
        PROXY_SERVICE,
        "-p",
        "80:80",
        "-p",
        "443:443",
        "--network",
        network,
        "-e",
        &listener,
        "-e",
        "MODE=swarm",
        PROXY_IMAGE,
    ])
}

/// Writes `document` to `path` with owner-only permissions.
pub(super) fn write_descriptor(path: &str, document: &str) -> String {
    format!(
        "umask 077 && printf '%s' {} > {}",
        escape(document.into()),
        escape(path.into())
    )
}

pub(super) fn start_stack(path: &str, stack_name: &str) -> String {
    join_escaped(&[
        "docker",
        "stack",
        "deploy",
        "--compose-file",
        path,
        stack_name,
    ])
}

/// Runs `command` inside the first running container of the stack's
/// application service.
///
/// The service task may still be pulling its image right after the stack is
/// deployed, so the container is polled for up to [`APP_START_TIMEOUT_SECS`].
pub(super) fn exec_in_app(stack_name: &str, command: &str) -> String {
    let service = format!("{stack_name}_{APP_SERVICE}");
    let filter = format!("name={service}");
    let missing = format!("no running container for {service} after {APP_START_TIMEOUT_SECS}s");
    format!(
        "app_id=; waited=0; \
         while [ -z \"$app_id\" ] && [ \"$waited\" -le {APP_START_TIMEOUT_SECS} ]; do \
         app_id=$(docker ps -q --filter {filter} | head -n 1); \
         [ -n \"$app_id\" ] || {{ sleep {APP_POLL_SECS}; waited=$((waited + {APP_POLL_SECS})); }}; \
         done; \
         [ -n \"$app_id\" ] || {{ echo {missing} >&2; exit 1; }}; \
         docker exec \"$app_id\" sh -c {command}",
        filter = escape(filter.as_str().into()),
        missing = escape(missing.as_str().into()),
        command = escape(command.into()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn init_cluster_joins_through_control_host() {
        let command = init_cluster(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 10)), "swarm");
        assert_eq!(
            command,
            "docker swarm init --advertise-addr 203.0.113.10 && docker-machine ssh swarm \
             \"docker swarm join --token $(docker swarm join-token -q worker) 203.0.113.10:2377\""
        );
    }

    #[test]
    fn init_cluster_brackets_ipv6_manager_address() {
        let command = init_cluster("2001:db8::1".parse().expect("valid ipv6"), "swarm");
        assert!(command.contains("[2001:db8::1]:2377"), "{command}");
    }

    #[test]
    fn install_tooling_escapes_url() {
        let command = install_tooling("https://example.com/dm?x=1&y=2");
        assert!(
            command.starts_with("curl -fsSL 'https://example.com/dm?x=1&y=2' -o"),
            "{command}"
        );
        assert!(command.ends_with("/usr/local/bin/docker-machine"));
    }

    #[test]
    fn network_name_is_escaped() {
        assert_eq!(
            create_network("my net"),
            "docker network create --driver overlay --attachable 'my net'"
        );
    }

    #[test]
    fn services_join_the_overlay_network() {
        assert!(deploy_listener("proxy").contains("--network proxy"));
        assert!(deploy_proxy("proxy").contains("--network proxy"));
        assert!(deploy_proxy("proxy").ends_with(PROXY_IMAGE));
    }

    #[test]
    fn descriptor_is_written_verbatim() {
        let command = write_descriptor("/root/stack.yml", "a: 'b'\n");
        assert_eq!(
            command,
            "umask 077 && printf '%s' 'a: '\\''b'\\''\n' > /root/stack.yml"
        );
    }

    #[test]
    fn exec_waits_for_stack_app_container() {
        let command = exec_in_app("app", "npm run migrate");

        assert!(command.starts_with("app_id=; waited=0; while"), "{command}");
        assert!(
            command.contains("app_id=$(docker ps -q --filter name=app_app | head -n 1);"),
            "{command}"
        );
        assert!(command.contains("[ \"$waited\" -le 300 ]"), "{command}");
        assert!(command.contains("sleep 5;"), "{command}");
        assert!(
            command.contains("{ echo 'no running container for app_app after 300s' >&2; exit 1; }"),
            "{command}"
        );
        assert!(
            command.ends_with("docker exec \"$app_id\" sh -c 'npm run migrate'"),
            "{command}"
        );
    }

    #[test]
    fn exec_escapes_stack_name_and_command() {
        let command = exec_in_app("my shop", "echo 'hi'");

        assert!(command.contains("--filter 'name=my shop_app'"), "{command}");
        assert!(
            command.ends_with("sh -c 'echo '\\''hi'\\'''"),
            "{command}"
        );
    }
}
