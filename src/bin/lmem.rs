//! CLI entry point for the `lmem` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use lane_memory::cli::commands::{self, Scope};
use lane_memory::engine::{
    restore_failed_lines, ProposalRequest, RecallRequest, WriteRequest, DEFAULT_IMPACT_DEPTH,
    DEFAULT_IMPACT_ITEMS,
};
use lane_memory::scope::{resolve_space_context, CallerState, Identity, SpaceContext};
use lane_memory::{LmemError, LmemResult};

#[derive(Parser)]
#[command(
    name = "lmem",
    about = "lane-memory CLI: scoped, budgeted memory for agent workflows"
)]
struct Cli {
    /// Output format: "text" (default) or "json"
    #[arg(long, default_value = "text", global = true)]
    format: String,

    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Session id of the caller
    #[arg(long, global = true)]
    session: Option<String>,

    /// User id of the caller
    #[arg(long, global = true)]
    user: Option<String>,

    /// Authenticated identity; overrides session and user ids
    #[arg(long, global = true)]
    identity: Option<String>,

    /// Project root used to derive the project id
    #[arg(long, global = true)]
    project_root: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ScopeArgs {
    /// Space: session, user, project or system
    #[arg(long, default_value = "session")]
    space: String,
    /// Lane: my, team, system or agent. Defaults to the space's lane.
    #[arg(long)]
    lane: Option<String>,
    /// Agent id, for the agent lane
    #[arg(long)]
    agent: Option<String>,
}

impl ScopeArgs {
    fn scope(&self) -> LmemResult<Scope> {
        Ok(Scope {
            space: commands::parse_space(&self.space)?,
            lane: self.lane.as_deref().map(commands::parse_lane).transpose()?,
            agent: self.agent.clone(),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty snapshot file
    Create {
        /// Path to the snapshot file to create
        file: PathBuf,
        /// Contract JSON file
        #[arg(long)]
        contract: Option<PathBuf>,
        /// Engine config JSON file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Display information about a snapshot file
    Info {
        /// Path to the snapshot file
        file: PathBuf,
    },
    /// Write a memory item
    Write {
        /// Path to the snapshot file
        file: PathBuf,
        /// The item text
        text: String,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Kind: short_term, semantic or profile
        #[arg(long, default_value = "short_term")]
        kind: String,
        /// Event type: context, decision, preference or fact
        #[arg(long = "event", default_value = "context")]
        event_type: String,
        /// Source of the text, e.g. user, ai or tool
        #[arg(long, default_value = "user")]
        source: String,
        /// Authority override
        #[arg(long)]
        authority: Option<String>,
        /// Explicit dedup key
        #[arg(long)]
        dedup_key: Option<String>,
        /// Link to an existing item as type:id, e.g. depends_on:3. Repeatable.
        #[arg(long = "link")]
        links: Vec<String>,
    },
    /// Recall items of one store key
    Recall {
        /// Path to the snapshot file
        file: PathBuf,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Kind: short_term, semantic or profile
        #[arg(long, default_value = "short_term")]
        kind: String,
        /// Only items of this phase
        #[arg(long)]
        phase: Option<String>,
        /// Keep at most this many raw items
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Start a new phase
    Phase {
        /// Path to the snapshot file
        file: PathBuf,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Optional phase name
        #[arg(long)]
        name: Option<String>,
    },
    /// Diff two phases, by default the last two
    Diff {
        /// Path to the snapshot file
        file: PathBuf,
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Render the team summary instead of the raw diff
        #[arg(long)]
        team_summary: bool,
    },
    /// Show budget usage
    Budget {
        /// Path to the snapshot file
        file: PathBuf,
        /// Space to report on; every key when omitted
        #[arg(long)]
        space: Option<String>,
        #[arg(long)]
        lane: Option<String>,
        #[arg(long)]
        agent: Option<String>,
    },
    /// Apply the forget policy
    Forget {
        /// Path to the snapshot file
        file: PathBuf,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Kind: short_term, semantic or profile
        #[arg(long, default_value = "short_term")]
        kind: String,
    },
    /// Promote an item into a wider space
    Promote {
        /// Path to the snapshot file
        file: PathBuf,
        /// Item id
        item_id: u64,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Target space
        #[arg(long)]
        to: String,
    },
    /// Show what a change to one item could affect
    Impact {
        /// Path to the snapshot file
        file: PathBuf,
        /// Item id
        item_id: u64,
        /// Link hops to follow
        #[arg(long, default_value_t = DEFAULT_IMPACT_DEPTH)]
        depth: usize,
        /// Most items to report
        #[arg(long, default_value_t = DEFAULT_IMPACT_ITEMS)]
        max: usize,
        /// Preview a change instead: replace, delete or promote
        #[arg(long)]
        change: Option<String>,
    },
    /// Propose a memory to the project team
    Propose {
        /// Path to the snapshot file
        file: PathBuf,
        /// The proposed text
        text: String,
        /// Event type: context, decision, preference or fact
        #[arg(long = "event", default_value = "decision")]
        event_type: String,
        /// Make the proposal a team rule with this priority
        #[arg(long)]
        rule_priority: Option<i32>,
        /// Approvals needed; defaults to the contract
        #[arg(long)]
        approvals: Option<usize>,
    },
    /// Approve a pending proposal
    Approve {
        /// Path to the snapshot file
        file: PathBuf,
        /// Proposal id, e.g. proposal-1
        proposal_id: String,
    },
    /// Reject a pending proposal
    Reject {
        /// Path to the snapshot file
        file: PathBuf,
        /// Proposal id, e.g. proposal-1
        proposal_id: String,
    },
    /// List pending proposals and active rules
    Proposals {
        /// Path to the snapshot file
        file: PathBuf,
    },
    /// Hand one agent's project memory to another agent
    Handoff {
        /// Path to the snapshot file
        file: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Apply or reject a pending handoff packet
    ApplyHandoff {
        /// Path to the snapshot file
        file: PathBuf,
        /// Packet id, e.g. handoff-1
        packet_id: String,
        /// Reject the packet instead of applying it
        #[arg(long)]
        reject: bool,
    },
}

fn context(cli: &Cli) -> SpaceContext {
    let state = CallerState {
        session_id: cli.session.clone(),
        user_id: cli.user.clone(),
    };
    let identity = cli.identity.as_deref().map(Identity::new);
    resolve_space_context(&state, identity.as_ref(), cli.project_root.as_deref(), None)
}

fn run(cli: &Cli) -> LmemResult<()> {
    let json = cli.format == "json";
    let ctx = context(cli);

    match &cli.command {
        Commands::Create {
            file,
            contract,
            config,
        } => commands::cmd_create(file, contract.as_deref(), config.as_deref()),
        Commands::Info { file } => commands::cmd_info(file, json),
        Commands::Write {
            file,
            text,
            scope,
            kind,
            event_type,
            source,
            authority,
            dedup_key,
            links,
        } => {
            let scope = scope.scope()?;
            let mut request = WriteRequest::new(
                commands::parse_kind(kind)?,
                scope.space,
                commands::parse_event_type(event_type)?,
                text.as_str(),
                source.as_str(),
            );
            request.lane = scope.lane;
            request.agent_id = scope.agent;
            request.authority = authority
                .as_deref()
                .map(commands::parse_authority)
                .transpose()?;
            request.dedup_key = dedup_key.clone();
            request.links = links
                .iter()
                .map(|raw| commands::parse_link(raw))
                .collect::<LmemResult<Vec<_>>>()?;
            commands::cmd_write(file, &ctx, request, json)
        }
        Commands::Recall {
            file,
            scope,
            kind,
            phase,
            limit,
        } => {
            let scope = scope.scope()?;
            let mut request = RecallRequest::new(scope.store_key(&ctx)?, commands::parse_kind(kind)?);
            request.phase_id = phase.clone();
            request.limit = *limit;
            request.reader_agent = scope.agent;
            commands::cmd_recall(file, &request, json)
        }
        Commands::Phase { file, scope, name } => {
            let key = scope.scope()?.store_key(&ctx)?;
            commands::cmd_phase(file, &key, name.as_deref(), json)
        }
        Commands::Diff {
            file,
            scope,
            from,
            to,
            team_summary,
        } => {
            let key = scope.scope()?.store_key(&ctx)?;
            commands::cmd_diff(
                file,
                &key,
                from.as_deref(),
                to.as_deref(),
                *team_summary,
                json,
            )
        }
        Commands::Budget {
            file,
            space,
            lane,
            agent,
        } => {
            let key = match space {
                Some(space) => {
                    let scope = ScopeArgs {
                        space: space.clone(),
                        lane: lane.clone(),
                        agent: agent.clone(),
                    };
                    Some(scope.scope()?.store_key(&ctx)?)
                }
                None => None,
            };
            commands::cmd_budget(file, key.as_ref(), json)
        }
        Commands::Forget { file, scope, kind } => {
            let key = scope.scope()?.store_key(&ctx)?;
            commands::cmd_forget(file, &key, commands::parse_kind(kind)?, json)
        }
        Commands::Promote {
            file,
            item_id,
            scope,
            to,
        } => {
            let key = scope.scope()?.store_key(&ctx)?;
            let to_space = commands::parse_space(to)?;
            commands::cmd_promote(file, &ctx, &key, *item_id, to_space, json)
        }
        Commands::Impact {
            file,
            item_id,
            depth,
            max,
            change,
        } => {
            let change = change
                .as_deref()
                .map(commands::parse_change_kind)
                .transpose()?;
            commands::cmd_impact(file, *item_id, *depth, *max, change, json)
        }
        Commands::Propose {
            file,
            text,
            event_type,
            rule_priority,
            approvals,
        } => {
            let mut request = ProposalRequest::new(
                commands::parse_event_type(event_type)?,
                text.as_str(),
                ctx.user_id.as_str(),
            );
            request.rule_priority = *rule_priority;
            request.approvals_required = *approvals;
            commands::cmd_propose(file, &ctx, request, json)
        }
        Commands::Approve { file, proposal_id } => {
            commands::cmd_decide(file, proposal_id, &ctx.user_id, true, json)
        }
        Commands::Reject { file, proposal_id } => {
            commands::cmd_decide(file, proposal_id, &ctx.user_id, false, json)
        }
        Commands::Proposals { file } => commands::cmd_proposals(file, &ctx, json),
        Commands::Handoff { file, from, to } => commands::cmd_handoff(file, &ctx, from, to, json),
        Commands::ApplyHandoff {
            file,
            packet_id,
            reject,
        } => commands::cmd_apply_handoff(file, packet_id, *reject, json),
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        // env_logger is only available in dev/test builds
        eprintln!("Verbose mode enabled");
    }

    if let Err(e) = run(&cli) {
        let code = match &e {
            LmemError::Io(_) => 1,
            LmemError::InvalidMagic
            | LmemError::UnsupportedVersion(_)
            | LmemError::ChecksumMismatch
            | LmemError::Truncated
            | LmemError::Compression(_)
            | LmemError::Json(_) => 2,
            LmemError::ItemNotFound(_)
            | LmemError::PhaseNotFound { .. }
            | LmemError::ProposalNotFound(_)
            | LmemError::HandoffNotFound(_) => 4,
            _ => 3,
        };
        if code == 2 {
            for line in restore_failed_lines("The snapshot file could not be read.", &e.to_string()) {
                eprintln!("{}", line);
            }
        } else {
            eprintln!("Error: {}", e);
        }
        process::exit(code);
    }
}
