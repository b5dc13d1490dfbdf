pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# RDS PGSQL LOG CONFIGURATION
# =============================================================================
# Polls the PostgreSQL log files of one managed database instance and emits
# one structured record per log entry.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/rds-pgsql-log/config.yml
#   3. /etc/rds-pgsql-log/config.yml
#
# Any value may reference an environment variable with the $env{...} syntax.

# =============================================================================
# SOURCE (required)
# =============================================================================
source:
  region: ap-northeast-1
  db_instance_identifier: my-postgres-instance
  # Gateway exposing the log-file listing and portion download calls
  endpoint: http://127.0.0.1:8080
  # Per-request timeout for the listing and download calls
  timeout: 30s

# =============================================================================
# POLLING
# =============================================================================
poll:
  # Seconds between polls when the instance has no more data queued
  refresh_interval: 30
  # Delay before polling again when more data is already pending
  drain_delay: 1s
  # Cursor file (high-water timestamp plus one marker per log file)
  pos_file: ~/.local/share/rds-pgsql-log/pos.dat

# Tag attached to every emitted record
tag: rds-pgsql.log

# =============================================================================
# OUTPUT
# =============================================================================
# 'stdout' writes JSON lines to standard output; 'file' appends them to path.
output:
  type: stdout
"#
    .to_string()
}
