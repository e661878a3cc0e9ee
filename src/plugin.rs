use std::fs;
use std::path::Path;

/// Graph description handed to the monitoring agent's `config` run. The
/// field names must match the snapshot keys exactly.
pub fn config_block() -> String {
    "graph_title SBS feed reception regularity\n\
     graph_args --base 1000 -l 0\n\
     graph_vlabel seconds\n\
     graph_category radio\n\
     graph_info Per-aircraft regularity of the BaseStation feed: how far \
     apart consecutive position fixes arrive, and how far each aircraft \
     moved between them at its reported speed.\n\
     ts_sd.label fix interval spread\n\
     ts_mean.label mean fix interval\n\
     ts_n.label fix interval samples\n\
     pos_sd.label displacement spread\n\
     pos_mean.label mean displacement (s of flight)\n\
     pos_n.label displacement samples\n"
        .to_string()
}

/// The latest snapshot for a fetch run, or a comment line the agent shows
/// when the monitor has not written one yet. Either way the caller exits
/// zero; a missing snapshot is an answer, not a failure.
pub fn fetch(snapshot_path: &Path) -> String {
    match fs::read_to_string(snapshot_path) {
        Ok(contents) => contents,
        Err(e) => format!("# cannot read {}: {}\n", snapshot_path.display(), e),
    }
}

pub fn usage() -> String {
    "usage: sbsmon [--config <file>] [config|fg|daemon]\n\
     \n\
     \x20 config   print the munin graph description\n\
     \x20 (none)   print the latest snapshot\n\
     \x20 fg       run the monitor in the foreground\n\
     \x20 daemon   run the monitor detached\n"
        .to_string()
}
