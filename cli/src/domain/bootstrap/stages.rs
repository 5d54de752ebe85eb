//! The bootstrap stage catalog and sequencing.

use std::fmt::Write as _;

use agenthost_common::{AgentId, EnvValue, FlatEnv, ProfileField, SecretString, global, parse_agent_ids};

use crate::domain::bootstrap::artifacts::{
    AGENT_CONFIG_DIR, AGENT_CONFIG_FILE, GATEWAY_UNIT_NAME, HOME, RepoRemote, SCHEDULED_JOBS,
    WorkspaceLayout, gateway_config_filter, gateway_unit, shell_quote, ssh_host_block, sync_cron,
    telegram_channel_filter,
};
use crate::domain::bootstrap::{
    BootstrapPlan, BootstrapStage, FailurePolicy, GATEWAY_PORT, Guard, LOGIN_USER,
    ONBOARD_EXPECTED_ERROR, SecretInput, StageKind,
};
use crate::domain::config::{HOSTNAME_RE, Readiness};
use crate::domain::error::BootstrapError;

/// Build the stage sequence with default readiness polling.
///
/// # Errors
///
/// See [`sequence_with`].
pub fn sequence(env: &FlatEnv, hostname: &str) -> Result<BootstrapPlan, BootstrapError> {
    sequence_with(env, hostname, Readiness::default())
}

/// Build the ordered stage list for `hostname` from the flat environment.
///
/// Optional stages appear only when their inputs are non-empty.
///
/// # Errors
///
/// Returns `BootstrapError::MissingInput` when a required value is empty, or
/// `BootstrapError::UnsupportedRepoUrl` for a workspace URL that cannot be
/// routed through a per-profile SSH alias.
pub fn sequence_with(
    env: &FlatEnv,
    hostname: &str,
    readiness: Readiness,
) -> Result<BootstrapPlan, BootstrapError> {
    if !HOSTNAME_RE.is_match(hostname) {
        return Err(BootstrapError::InvalidInput {
            key: "hostname".to_string(),
            reason: format!("'{hostname}' is not a DNS label"),
        });
    }
    let auth_key = required_secret(env, global::TAILSCALE_AUTH_KEY)?;
    let setup_token = required_secret(env, global::CLAUDE_SETUP_TOKEN)?;
    let gateway_token = required_secret(env, global::GATEWAY_TOKEN)?;

    let mut stages = vec![
        create_user(),
        install_overlay(),
        join_overlay(hostname, auth_key),
        host_firewall(),
        runtime_deps(),
        onboard_agent(),
        install_setup_token(setup_token),
        gateway_config(gateway_token),
        gateway_service(),
        readiness_probe(readiness),
        external_access(),
    ];

    let bot_token = optional_secret(env, global::TELEGRAM_BOT_TOKEN);
    let main_user = optional_plain(env, &ProfileField::TelegramUserId.env_key(None));
    if let (Some(bot), Some(user)) = (bot_token, main_user) {
        let group = optional_plain(env, &ProfileField::TelegramGroupId.env_key(None));
        stages.push(chat_channels(bot, &user, group.as_deref().unwrap_or_default()));
    }

    let ids = env
        .get(global::AGENT_IDS)
        .map(|v| parse_agent_ids(v.expose()))
        .transpose()
        .map_err(|e| BootstrapError::InvalidInput {
            key: global::AGENT_IDS.to_string(),
            reason: e.to_string(),
        })?
        .unwrap_or_default();
    for id in std::iter::once(None).chain(ids.iter().map(Some)) {
        stages.extend(workspace_stages(env, id, hostname)?);
    }

    Ok(BootstrapPlan {
        hostname: hostname.to_string(),
        stages,
    })
}

// ── Inputs ───────────────────────────────────────────────────────────────────

fn required_secret(env: &FlatEnv, key: &str) -> Result<SecretString, BootstrapError> {
    optional_secret(env, key).ok_or_else(|| BootstrapError::MissingInput(key.to_string()))
}

fn optional_secret(env: &FlatEnv, key: &str) -> Option<SecretString> {
    match env.non_empty(key)? {
        EnvValue::Secret(s) => Some(s.clone()),
        EnvValue::Plain(p) => Some(SecretString::new(p.as_str())),
    }
}

/// Text of a setting, also when the configuration marks it secret.
fn optional_plain(env: &FlatEnv, key: &str) -> Option<String> {
    env.non_empty(key).map(|v| v.expose().to_string())
}

fn stage(kind: StageKind, guard: Guard, policy: FailurePolicy, body: String) -> BootstrapStage {
    BootstrapStage {
        kind,
        name: kind.base_name().to_string(),
        guard,
        policy,
        secrets: Vec::new(),
        body,
    }
}

fn as_user(cmd: &str) -> String {
    format!("runuser -u {LOGIN_USER} -- env HOME={HOME} {cmd}")
}

// ── Stages 1–10 ──────────────────────────────────────────────────────────────

fn create_user() -> BootstrapStage {
    let body = format!(
        "useradd -m -s /bin/bash -G sudo {u}
install -d -m 700 -o {u} -g {u} {HOME}/.ssh
if [ -f /root/.ssh/authorized_keys ]; then
    install -m 600 -o {u} -g {u} /root/.ssh/authorized_keys {HOME}/.ssh/authorized_keys
fi
echo '{u} ALL=(ALL) NOPASSWD:ALL' > /etc/sudoers.d/90-{u}
chmod 440 /etc/sudoers.d/90-{u}
",
        u = LOGIN_USER
    );
    stage(
        StageKind::CreateUser,
        Guard::SkipWhen(format!("id -u {LOGIN_USER} >/dev/null 2>&1")),
        FailurePolicy::Fatal,
        body,
    )
}

fn install_overlay() -> BootstrapStage {
    let body = "if ! command -v tailscale >/dev/null 2>&1; then
    curl -fsSL https://tailscale.com/install.sh | sh
fi
systemctl enable --now tailscaled
"
    .to_string();
    stage(
        StageKind::InstallOverlay,
        Guard::Reentrant,
        FailurePolicy::Fatal,
        body,
    )
}

fn join_overlay(hostname: &str, auth_key: SecretString) -> BootstrapStage {
    let key = SecretInput::new("tailscale-auth-key", auth_key);
    let body = format!(
        "tailscale up --auth-key=file:{path} --hostname={host} --ssh
for _ in $(seq 1 30); do
    tailscale status >/dev/null 2>&1 && break
    sleep 2
done
tailscale status
",
        path = key.path(),
        host = shell_quote(hostname),
    );
    let mut s = stage(
        StageKind::JoinOverlay,
        Guard::Reentrant,
        FailurePolicy::Fatal,
        body,
    );
    s.secrets.push(key);
    s
}

fn host_firewall() -> BootstrapStage {
    let body = "export DEBIAN_FRONTEND=noninteractive
command -v ufw >/dev/null 2>&1 || apt-get install -y -q ufw
ufw default deny incoming
ufw default allow outgoing
ufw allow in on tailscale0
ufw --force enable
"
    .to_string();
    stage(
        StageKind::HostFirewall,
        Guard::Reentrant,
        FailurePolicy::Fatal,
        body,
    )
}

fn runtime_deps() -> BootstrapStage {
    let body = format!(
        "export DEBIAN_FRONTEND=noninteractive
apt-get update -q
apt-get install -y -q ca-certificates curl git jq docker.io
if ! node --version 2>/dev/null | grep -q '^v22\\.'; then
    curl -fsSL https://deb.nodesource.com/setup_22.x | bash -
    apt-get install -y -q nodejs
fi
usermod -aG docker {LOGIN_USER}
systemctl enable --now docker
"
    );
    stage(
        StageKind::RuntimeDeps,
        Guard::Reentrant,
        FailurePolicy::Fatal,
        body,
    )
}

fn onboard_agent() -> BootstrapStage {
    let body = format!(
        "npm install -g openclaw@latest
{onboard}
",
        onboard = as_user(
            "openclaw onboard --non-interactive --accept-risk --mode local --skip-health"
        ),
    );
    stage(
        StageKind::OnboardAgent,
        Guard::SkipWhen(format!("test -f {AGENT_CONFIG_FILE}")),
        FailurePolicy::FatalUnlessExpected(ONBOARD_EXPECTED_ERROR.to_string()),
        body,
    )
}

/// Runs on every boot: a tolerated onboarding failure must not leave the
/// agent without model credentials.
fn install_setup_token(setup_token: SecretString) -> BootstrapStage {
    let token = SecretInput::new("claude-setup-token", setup_token);
    let body = format!(
        "{paste} < {path}\n",
        paste = as_user("openclaw models auth paste-token --provider anthropic"),
        path = token.path(),
    );
    let mut s = stage(
        StageKind::SetupToken,
        Guard::Reentrant,
        FailurePolicy::Fatal,
        body,
    );
    s.secrets.push(token);
    s
}

fn gateway_config(gateway_token: SecretString) -> BootstrapStage {
    let token = SecretInput::new("gateway-token", gateway_token);
    let body = format!(
        "install -d -m 700 -o {u} -g {u} {AGENT_CONFIG_DIR}
cfg={AGENT_CONFIG_FILE}
[ -s \"$cfg\" ] || echo '{{}}' > \"$cfg\"
tmp=\"$(mktemp \"$cfg.XXXXXX\")\"
jq --rawfile token {path} '
{filter}
' \"$cfg\" > \"$tmp\"
install -m 600 -o {u} -g {u} \"$tmp\" \"$cfg\"
rm -f \"$tmp\"
",
        u = LOGIN_USER,
        path = token.path(),
        filter = gateway_config_filter(),
    );
    let mut s = stage(
        StageKind::GatewayConfig,
        Guard::Reentrant,
        FailurePolicy::Fatal,
        body,
    );
    s.secrets.push(token);
    s
}

fn gateway_service() -> BootstrapStage {
    let body = format!(
        "cat > /etc/systemd/system/{GATEWAY_UNIT_NAME} <<'UNIT'
{unit}UNIT
systemctl daemon-reload
systemctl enable {GATEWAY_UNIT_NAME}
systemctl restart {GATEWAY_UNIT_NAME}
",
        unit = gateway_unit(),
    );
    stage(
        StageKind::GatewayService,
        Guard::Reentrant,
        FailurePolicy::Fatal,
        body,
    )
}

fn readiness_probe(readiness: Readiness) -> BootstrapStage {
    let Readiness {
        attempts,
        delay_secs,
    } = readiness;
    let body = format!(
        "for attempt in $(seq 1 {attempts}); do
    if curl -fsS --max-time 5 http://127.0.0.1:{GATEWAY_PORT}/health >/dev/null 2>&1; then
        echo \"gateway healthy after $attempt attempt(s)\"
        return 0
    fi
    sleep {delay_secs}
done
echo 'gateway not healthy after {attempts} attempts' >&2
return 1
"
    );
    stage(
        StageKind::Readiness,
        Guard::Reentrant,
        FailurePolicy::Fatal,
        body,
    )
}

fn external_access() -> BootstrapStage {
    let body = format!(
        "tailscale serve --bg --https=443 http://127.0.0.1:{GATEWAY_PORT}
tailscale serve status
"
    );
    stage(
        StageKind::ExternalAccess,
        Guard::Reentrant,
        FailurePolicy::Fatal,
        body,
    )
}

// ── Stage 11 ─────────────────────────────────────────────────────────────────

fn chat_channels(bot_token: SecretString, user_id: &str, group_id: &str) -> BootstrapStage {
    let bot = SecretInput::new("telegram-bot-token", bot_token);
    let mut body = format!(
        "cfg={AGENT_CONFIG_FILE}
tmp=\"$(mktemp \"$cfg.XXXXXX\")\"
jq --rawfile bot {path} --arg user {user} --arg group {group} '
{filter}
' \"$cfg\" > \"$tmp\"
install -m 600 -o {u} -g {u} \"$tmp\" \"$cfg\"
rm -f \"$tmp\"
systemctl restart {GATEWAY_UNIT_NAME}
",
        path = bot.path(),
        user = shell_quote(user_id),
        group = shell_quote(group_id),
        filter = telegram_channel_filter(),
        u = LOGIN_USER,
    );
    for job in SCHEDULED_JOBS {
        let name = shell_quote(job.name);
        let _ = writeln!(
            body,
            "{remove} >/dev/null 2>&1 || true",
            remove = as_user(&format!("openclaw cron remove --name {name}")),
        );
        let _ = writeln!(
            body,
            "{add} || echo \"warning: could not register job {job}\" >&2",
            add = as_user(&format!(
                "openclaw cron add --name {name} --cron {cron} --channel telegram --to {to} --message {msg}",
                cron = shell_quote(job.cron),
                to = shell_quote(user_id),
                msg = shell_quote(job.message),
            )),
            job = job.name,
        );
    }
    let mut s = stage(
        StageKind::ChatChannels,
        Guard::Reentrant,
        FailurePolicy::BestEffort,
        body,
    );
    s.secrets.push(bot);
    s
}

// ── Stage 12 ─────────────────────────────────────────────────────────────────

/// Setup and push stages for one profile, empty when it has no workspace.
fn workspace_stages(
    env: &FlatEnv,
    id: Option<&AgentId>,
    hostname: &str,
) -> Result<Vec<BootstrapStage>, BootstrapError> {
    let Some(url) = optional_plain(env, &ProfileField::WorkspaceRepoUrl.env_key(id)) else {
        return Ok(Vec::new());
    };
    let label = id.map_or(agenthost_common::MAIN_PROFILE, AgentId::as_str);
    let remote = RepoRemote::parse(&url).ok_or_else(|| BootstrapError::UnsupportedRepoUrl {
        profile: label.to_string(),
        url: url.clone(),
    })?;
    let deploy_key = required_secret(env, &ProfileField::WorkspaceDeployKey.env_key(id))?;
    let layout = WorkspaceLayout::for_profile(label, id.is_none());
    Ok(vec![
        workspace_setup(&layout, &remote, deploy_key, hostname),
        workspace_push(&layout),
    ])
}

fn git(args: &str) -> String {
    as_user(&format!("git {args}"))
}

/// Deploy key, SSH alias, sync job and the local repository with its first
/// commit. Only the push to the remote is left to [`workspace_push`].
fn workspace_setup(
    layout: &WorkspaceLayout,
    remote: &RepoRemote,
    deploy_key: SecretString,
    hostname: &str,
) -> BootstrapStage {
    let key = SecretInput::new(format!("deploy-key-{}", layout.label), deploy_key);
    let body = format!(
        "ssh_dir={HOME}/.ssh
install -d -m 700 -o {u} -g {u} \"$ssh_dir\" \"$ssh_dir/config.d\"
install -m 600 -o {u} -g {u} {path} {key_path}
cat > \"$ssh_dir/config.d/{alias}.conf\" <<'SSHCONF'
{block}SSHCONF
touch \"$ssh_dir/config\"
if ! grep -qxF 'Include config.d/*.conf' \"$ssh_dir/config\"; then
    {{ echo 'Include config.d/*.conf'; cat \"$ssh_dir/config\"; }} > \"$ssh_dir/config.new\"
    mv \"$ssh_dir/config.new\" \"$ssh_dir/config\"
fi
if ! ssh-keygen -F {host} -f \"$ssh_dir/known_hosts\" >/dev/null 2>&1; then
    ssh-keyscan -t ed25519 {host} >> \"$ssh_dir/known_hosts\" 2>/dev/null
fi
chown -R {u}:{u} \"$ssh_dir\"
chmod 600 \"$ssh_dir/config\" \"$ssh_dir/config.d/{alias}.conf\"
install -d -m 755 -o {u} -g {u} {dir}
cat > {cron_file} <<'CRON'
{cron}CRON
chmod 644 {cron_file}
cd {dir}
[ -d .git ] || {init}
{name}
{email}
{remove_origin} >/dev/null 2>&1 || true
{add_origin}
{add_all}
{commit} || echo 'nothing to commit'
",
        u = LOGIN_USER,
        path = key.path(),
        key_path = layout.key_path,
        alias = layout.ssh_alias,
        block = ssh_host_block(layout, remote),
        host = remote.host,
        dir = layout.dir,
        cron_file = layout.cron_file,
        cron = sync_cron(layout),
        init = git("init -q -b main"),
        name = git("config user.name 'OpenClaw Agent'"),
        email = git(&format!("config user.email {}", shell_quote(&format!("agent@{hostname}")))),
        remove_origin = git("remote remove origin"),
        add_origin = git(&format!(
            "remote add origin {}",
            shell_quote(&remote.via_alias(&layout.ssh_alias))
        )),
        add_all = git("add -A"),
        commit = git("commit -q -m 'Initial workspace sync'"),
    );
    BootstrapStage {
        kind: StageKind::WorkspaceSetup,
        name: format!("{}-{}", StageKind::WorkspaceSetup.base_name(), layout.label),
        guard: Guard::Reentrant,
        policy: FailurePolicy::Fatal,
        secrets: vec![key],
        body,
    }
}

/// First push; the hourly job retries it, so a rejected push is tolerated.
fn workspace_push(layout: &WorkspaceLayout) -> BootstrapStage {
    let body = format!(
        "cd {dir}\n{push}\n",
        dir = layout.dir,
        push = git("push -q -u origin main"),
    );
    BootstrapStage {
        kind: StageKind::WorkspacePush,
        name: format!("{}-{}", StageKind::WorkspacePush.base_name(), layout.label),
        guard: Guard::Reentrant,
        policy: FailurePolicy::BestEffort,
        secrets: Vec::new(),
        body,
    }
}
