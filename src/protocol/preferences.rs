//! Computing preference knobs distributed through `<global_preferences>`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::wire::GlobalPreferences;

/// The full set of knobs a preference group controls.
///
/// Stored as a JSON document on the group row; unknown keys are ignored and
/// missing keys take the factory value, so older rows keep loading after a
/// knob is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceSettings {
    pub battery_charge_min_pct: Decimal,
    pub battery_max_temperature: Decimal,
    pub run_on_batteries: bool,
    pub run_if_user_active: bool,
    pub run_gpu_if_user_active: bool,
    pub suspend_if_no_recent_input: Decimal,
    pub idle_time_to_run: Decimal,
    pub start_hour: Decimal,
    pub end_hour: Decimal,
    pub net_start_hour: Decimal,
    pub net_end_hour: Decimal,
    pub leave_apps_in_memory: bool,
    pub max_ncpus_pct: Decimal,
    pub niu_max_ncpus_pct: Decimal,
    pub cpu_usage_limit: Decimal,
    pub niu_cpu_usage_limit: Decimal,
    pub suspend_cpu_usage: Decimal,
    pub niu_suspend_cpu_usage: Decimal,
    pub cpu_scheduling_period_minutes: Decimal,
    pub max_cpus: i32,
    pub work_buf_min_days: Decimal,
    pub work_buf_additional_days: Decimal,
    pub disk_interval: Decimal,
    pub disk_max_used_gb: Decimal,
    pub disk_max_used_pct: Decimal,
    pub disk_min_free_gb: Decimal,
    pub vm_max_used_pct: Decimal,
    pub ram_max_used_busy_pct: Decimal,
    pub ram_max_used_idle_pct: Decimal,
    pub confirm_before_connecting: bool,
    pub hangup_if_dialed: bool,
    pub max_bytes_sec_up: Decimal,
    pub max_bytes_sec_down: Decimal,
    pub daily_xfer_limit_mb: Decimal,
    pub daily_xfer_period_days: i32,
    pub network_wifi_only: bool,
    pub dont_verify_images: bool,
}

impl Default for PreferenceSettings {
    fn default() -> Self {
        Self {
            battery_charge_min_pct: Decimal::from(90),
            battery_max_temperature: Decimal::from(40),
            run_on_batteries: false,
            run_if_user_active: true,
            run_gpu_if_user_active: false,
            suspend_if_no_recent_input: Decimal::ZERO,
            idle_time_to_run: Decimal::from(3),
            start_hour: Decimal::ZERO,
            end_hour: Decimal::ZERO,
            net_start_hour: Decimal::ZERO,
            net_end_hour: Decimal::ZERO,
            leave_apps_in_memory: false,
            max_ncpus_pct: Decimal::ZERO,
            niu_max_ncpus_pct: Decimal::ONE_HUNDRED,
            cpu_usage_limit: Decimal::ONE_HUNDRED,
            niu_cpu_usage_limit: Decimal::ONE_HUNDRED,
            suspend_cpu_usage: Decimal::from(25),
            niu_suspend_cpu_usage: Decimal::from(50),
            cpu_scheduling_period_minutes: Decimal::from(60),
            max_cpus: 0,
            work_buf_min_days: Decimal::new(1, 1),
            work_buf_additional_days: Decimal::new(5, 1),
            disk_interval: Decimal::from(60),
            disk_max_used_gb: Decimal::ZERO,
            disk_max_used_pct: Decimal::from(90),
            disk_min_free_gb: Decimal::new(1, 1),
            vm_max_used_pct: Decimal::from(75),
            ram_max_used_busy_pct: Decimal::from(50),
            ram_max_used_idle_pct: Decimal::from(90),
            confirm_before_connecting: true,
            hangup_if_dialed: false,
            max_bytes_sec_up: Decimal::ZERO,
            max_bytes_sec_down: Decimal::ZERO,
            daily_xfer_limit_mb: Decimal::ZERO,
            daily_xfer_period_days: 0,
            network_wifi_only: false,
            dont_verify_images: false,
        }
    }
}

impl PreferenceSettings {
    /// Range checks for values an operator can set. Returns the first
    /// offending knob.
    pub fn validate(&self) -> Result<(), String> {
        let percentages = [
            ("battery_charge_min_pct", self.battery_charge_min_pct),
            ("max_ncpus_pct", self.max_ncpus_pct),
            ("niu_max_ncpus_pct", self.niu_max_ncpus_pct),
            ("cpu_usage_limit", self.cpu_usage_limit),
            ("niu_cpu_usage_limit", self.niu_cpu_usage_limit),
            ("suspend_cpu_usage", self.suspend_cpu_usage),
            ("niu_suspend_cpu_usage", self.niu_suspend_cpu_usage),
            ("disk_max_used_pct", self.disk_max_used_pct),
            ("vm_max_used_pct", self.vm_max_used_pct),
            ("ram_max_used_busy_pct", self.ram_max_used_busy_pct),
            ("ram_max_used_idle_pct", self.ram_max_used_idle_pct),
        ];
        for (name, value) in percentages {
            if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                return Err(format!("{name} must be between 0 and 100"));
            }
        }

        let hours = [
            ("start_hour", self.start_hour),
            ("end_hour", self.end_hour),
            ("net_start_hour", self.net_start_hour),
            ("net_end_hour", self.net_end_hour),
        ];
        for (name, value) in hours {
            if value < Decimal::ZERO || value >= Decimal::from(24) {
                return Err(format!("{name} must be at least 0 and below 24"));
            }
        }

        let positive = [
            ("cpu_scheduling_period_minutes", self.cpu_scheduling_period_minutes),
            ("disk_interval", self.disk_interval),
        ];
        for (name, value) in positive {
            if value <= Decimal::ZERO {
                return Err(format!("{name} must be greater than 0"));
            }
        }

        let non_negative = [
            ("suspend_if_no_recent_input", self.suspend_if_no_recent_input),
            ("idle_time_to_run", self.idle_time_to_run),
            ("work_buf_min_days", self.work_buf_min_days),
            ("work_buf_additional_days", self.work_buf_additional_days),
            ("disk_max_used_gb", self.disk_max_used_gb),
            ("disk_min_free_gb", self.disk_min_free_gb),
            ("max_bytes_sec_up", self.max_bytes_sec_up),
            ("max_bytes_sec_down", self.max_bytes_sec_down),
            ("daily_xfer_limit_mb", self.daily_xfer_limit_mb),
            ("battery_max_temperature", self.battery_max_temperature),
        ];
        for (name, value) in non_negative {
            if value < Decimal::ZERO {
                return Err(format!("{name} must not be negative"));
            }
        }

        if self.max_cpus < 0 {
            return Err("max_cpus must not be negative".to_string());
        }
        if self.daily_xfer_period_days < 0 {
            return Err("daily_xfer_period_days must not be negative".to_string());
        }

        Ok(())
    }

    /// Builds the reply block, stamped with the manager URL and the group's
    /// modification time so clients only reload it when it changed.
    #[must_use]
    pub fn to_global_preferences(&self, source_project: &str, mod_time: Decimal) -> GlobalPreferences {
        GlobalPreferences {
            source_project: Some(source_project.to_string()),
            mod_time: Some(mod_time),
            battery_charge_min_pct: self.battery_charge_min_pct,
            battery_max_temperature: self.battery_max_temperature,
            run_on_batteries: self.run_on_batteries,
            run_if_user_active: self.run_if_user_active,
            run_gpu_if_user_active: self.run_gpu_if_user_active,
            suspend_if_no_recent_input: self.suspend_if_no_recent_input,
            idle_time_to_run: self.idle_time_to_run,
            start_hour: self.start_hour,
            end_hour: self.end_hour,
            net_start_hour: self.net_start_hour,
            net_end_hour: self.net_end_hour,
            leave_apps_in_memory: self.leave_apps_in_memory,
            max_ncpus_pct: self.max_ncpus_pct,
            niu_max_ncpus_pct: self.niu_max_ncpus_pct,
            cpu_usage_limit: self.cpu_usage_limit,
            niu_cpu_usage_limit: self.niu_cpu_usage_limit,
            suspend_cpu_usage: self.suspend_cpu_usage,
            niu_suspend_cpu_usage: self.niu_suspend_cpu_usage,
            cpu_scheduling_period_minutes: self.cpu_scheduling_period_minutes,
            max_cpus: self.max_cpus,
            work_buf_min_days: self.work_buf_min_days,
            work_buf_additional_days: self.work_buf_additional_days,
            disk_interval: self.disk_interval,
            disk_max_used_gb: self.disk_max_used_gb,
            disk_max_used_pct: self.disk_max_used_pct,
            disk_min_free_gb: self.disk_min_free_gb,
            vm_max_used_pct: self.vm_max_used_pct,
            ram_max_used_busy_pct: self.ram_max_used_busy_pct,
            ram_max_used_idle_pct: self.ram_max_used_idle_pct,
            confirm_before_connecting: self.confirm_before_connecting,
            hangup_if_dialed: self.hangup_if_dialed,
            max_bytes_sec_up: self.max_bytes_sec_up,
            max_bytes_sec_down: self.max_bytes_sec_down,
            daily_xfer_limit_mb: self.daily_xfer_limit_mb,
            daily_xfer_period_days: self.daily_xfer_period_days,
            network_wifi_only: self.network_wifi_only,
            dont_verify_images: self.dont_verify_images,
        }
    }
}
