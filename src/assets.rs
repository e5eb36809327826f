//! Fixed host paths and the static configuration written to them.

/// Kernel modules loaded at boot
pub const MODULES_LOAD_PATH: &str = "/etc/modules-load.d/k8s.conf";
pub const KERNEL_MODULES: &[&str] = &["overlay", "br_netfilter"];

/// Kernel parameters required by kube-proxy and the CNI
pub const SYSCTL_PATH: &str = "/etc/sysctl.d/k8s.conf";
pub const SYSCTL_PARAMS: &[(&str, &str)] = &[
    ("net.bridge.bridge-nf-call-iptables", "1"),
    ("net.bridge.bridge-nf-call-ip6tables", "1"),
    ("net.ipv4.ip_forward", "1"),
];

pub const CONTAINERD_CONFIG_PATH: &str = "/etc/containerd/config.toml";
pub const CONTAINERD_UNIT_PATH: &str = "/usr/local/lib/systemd/system/containerd.service";
pub const CONTAINERD_PREFIX: &str = "/usr/local";
pub const CONTAINERD_BINARY: &str = "/usr/local/bin/containerd";
pub const RUNC_BINARY: &str = "/usr/local/sbin/runc";
pub const CONTAINERD_SOCKET: &str = "unix:///run/containerd/containerd.sock";

pub const CRICTL_CONFIG_PATH: &str = "/etc/crictl.yaml";
pub const FSTAB_PATH: &str = "/etc/fstab";

pub const APPARMOR_RUNC_PROFILE: &str = "/etc/apparmor.d/runc";
pub const APPARMOR_DISABLE_DIR: &str = "/etc/apparmor.d/disable";
pub const SELINUX_CONFIG_PATH: &str = "/etc/selinux/config";

pub const APT_KEYRING_PATH: &str = "/etc/apt/keyrings/kubernetes-apt-keyring.gpg";
pub const APT_SOURCE_PATH: &str = "/etc/apt/sources.list.d/kubernetes.list";
pub const YUM_REPO_PATH: &str = "/etc/yum.repos.d/kubernetes.repo";
/// Repository id inside `kubernetes.repo`
pub const YUM_REPO_ID: &str = "kubernetes";

/// Node tools, in install order
pub const KUBE_PACKAGES: &[&str] = &["kubelet", "kubeadm", "kubectl"];

const K8S_PKGS_BASE: &str = "https://pkgs.k8s.io/core:/stable:";

/// Contents of the modules-load drop-in.
pub fn modules_load_conf() -> String {
    KERNEL_MODULES
        .iter()
        .map(|module| format!("{module}\n"))
        .collect()
}

/// Contents of the sysctl drop-in.
pub fn sysctl_conf() -> String {
    SYSCTL_PARAMS
        .iter()
        .map(|(key, value)| format!("{key} = {value}\n"))
        .collect()
}

/// containerd configuration: CRI plugin with the runc v2 shim and the
/// systemd cgroup driver kubelet expects.
pub const CONTAINERD_CONFIG: &str = r#"version = 2

[plugins]
  [plugins."io.containerd.grpc.v1.cri"]
    [plugins."io.containerd.grpc.v1.cri".containerd]
      discard_unpacked_layers = true
      [plugins."io.containerd.grpc.v1.cri".containerd.runtimes]
        [plugins."io.containerd.grpc.v1.cri".containerd.runtimes.runc]
          runtime_type = "io.containerd.runc.v2"
          [plugins."io.containerd.grpc.v1.cri".containerd.runtimes.runc.options]
            SystemdCgroup = true
"#;

/// crictl endpoint configuration.
pub fn crictl_yaml() -> String {
    format!(
        "runtime-endpoint: {CONTAINERD_SOCKET}\nimage-endpoint: {CONTAINERD_SOCKET}\ntimeout: 10\n"
    )
}

/// Base URL of the Debian repository for a channel.
pub fn apt_repo_url(channel: &str) -> String {
    format!("{K8S_PKGS_BASE}/{channel}/deb/")
}

/// Signing key of the Debian repository for a channel.
pub fn apt_release_key_url(channel: &str) -> String {
    format!("{}Release.key", apt_repo_url(channel))
}

/// `kubernetes.list` line for a channel.
pub fn apt_source_list(channel: &str) -> String {
    format!(
        "deb [signed-by={APT_KEYRING_PATH}] {} /\n",
        apt_repo_url(channel)
    )
}

/// `kubernetes.repo` for a channel. The node tools are excluded from
/// normal updates and only installed with `--disableexcludes`.
pub fn yum_repo(channel: &str) -> String {
    let base = format!("{K8S_PKGS_BASE}/{channel}/rpm/");
    format!(
        "[{YUM_REPO_ID}]\n\
         name=Kubernetes\n\
         baseurl={base}\n\
         enabled=1\n\
         gpgcheck=1\n\
         gpgkey={base}repodata/repomd.xml.key\n\
         exclude=kubelet kubeadm kubectl cri-tools kubernetes-cni\n"
    )
}
