//! `com.redhat.RHSM1` over the system bus.
//!
//! Registration goes through a private peer-to-peer socket: the service
//! hands out its address from `RegisterServer.Start`, credentials travel
//! only over that socket, and the server is stopped afterwards.
use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;
use zbus::blocking::Connection;
use zbus::blocking::connection::Builder;
use zbus::zvariant::{DynamicType, OwnedValue, Value};

use super::{RegisterOptions, RhsmError, SubscriptionService, parse_organizations};

const SERVICE: &str = "com.redhat.RHSM1";
const CONSUMER_PATH: &str = "/com/redhat/RHSM1/Consumer";
const CONSUMER_IFACE: &str = "com.redhat.RHSM1.Consumer";
const REGISTER_SERVER_PATH: &str = "/com/redhat/RHSM1/RegisterServer";
const REGISTER_SERVER_IFACE: &str = "com.redhat.RHSM1.RegisterServer";
const REGISTER_PATH: &str = "/com/redhat/RHSM1/Register";
const REGISTER_IFACE: &str = "com.redhat.RHSM1.Register";
const UNREGISTER_PATH: &str = "/com/redhat/RHSM1/Unregister";
const UNREGISTER_IFACE: &str = "com.redhat.RHSM1.Unregister";
const CONFIG_PATH: &str = "/com/redhat/RHSM1/Config";
const CONFIG_IFACE: &str = "com.redhat.RHSM1.Config";

impl From<zbus::Error> for RhsmError {
    fn from(e: zbus::Error) -> Self {
        match e {
            zbus::Error::MethodError(name, description, _) => {
                Self::decode(name.as_str(), description.as_deref())
            }
            other => Self::Bus(other.to_string()),
        }
    }
}

/// Send a method call and return the reply message.
fn call<B>(
    conn: &Connection,
    path: &str,
    iface: &str,
    method: &str,
    body: &B,
) -> Result<zbus::Message, RhsmError>
where
    B: Serialize + DynamicType,
{
    tracing::debug!("calling {iface}.{method} on {path}");
    Ok(conn.call_method(Some(SERVICE), path, Some(iface), method, body)?)
}

fn reply_string(msg: &zbus::Message) -> Result<String, RhsmError> {
    msg.body()
        .deserialize::<String>()
        .map_err(|e| RhsmError::Malformed(e.to_string()))
}

/// Subscription service reached over D-Bus.
#[derive(Debug)]
pub struct DbusSubscription {
    locale: String,
    bus: OnceLock<Connection>,
}

impl DbusSubscription {
    /// Adapter passing `locale` with every call.
    #[must_use]
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            bus: OnceLock::new(),
        }
    }

    /// The system bus, connected on first use.
    fn bus(&self) -> Result<&Connection, RhsmError> {
        if let Some(conn) = self.bus.get() {
            return Ok(conn);
        }
        let conn = Connection::system()
            .map_err(|e| RhsmError::Bus(format!("cannot connect to system D-Bus: {e}")))?;
        Ok(self.bus.get_or_init(|| conn))
    }

    /// Run `f` against a private registration connection.
    fn with_register_server<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, RhsmError>,
    ) -> Result<T, RhsmError> {
        let bus = self.bus()?;
        let start = call(
            bus,
            REGISTER_SERVER_PATH,
            REGISTER_SERVER_IFACE,
            "Start",
            &(self.locale.as_str(),),
        )?;
        let address = reply_string(&start)?;
        tracing::debug!("private registration socket at {address}");

        let result = Builder::address(address.as_str())
            .and_then(|b| b.p2p().build())
            .map_err(|e| RhsmError::Bus(format!("cannot open registration socket: {e}")))
            .and_then(|private| f(&private));

        if let Err(e) = call(
            bus,
            REGISTER_SERVER_PATH,
            REGISTER_SERVER_IFACE,
            "Stop",
            &(self.locale.as_str(),),
        ) {
            tracing::warn!("cannot stop registration server: {e}");
        }
        result
    }
}

impl SubscriptionService for DbusSubscription {
    fn consumer_uuid(&self) -> Result<String, RhsmError> {
        let msg = call(
            self.bus()?,
            CONSUMER_PATH,
            CONSUMER_IFACE,
            "GetUuid",
            &(self.locale.as_str(),),
        )?;
        reply_string(&msg)
    }

    fn register(
        &self,
        org: &str,
        username: &str,
        password: &str,
        options: &RegisterOptions,
    ) -> Result<(), RhsmError> {
        let options = options.to_dbus_options();
        let connection_options: HashMap<String, String> = HashMap::new();
        self.with_register_server(|private| {
            call(
                private,
                REGISTER_PATH,
                REGISTER_IFACE,
                "Register",
                &(
                    org,
                    username,
                    password,
                    &options,
                    &connection_options,
                    self.locale.as_str(),
                ),
            )
            .map(drop)
        })
    }

    fn register_with_activation_keys(
        &self,
        org: &str,
        keys: &[String],
        options: &RegisterOptions,
    ) -> Result<(), RhsmError> {
        let options = options.to_dbus_options();
        let connection_options: HashMap<String, String> = HashMap::new();
        self.with_register_server(|private| {
            call(
                private,
                REGISTER_PATH,
                REGISTER_IFACE,
                "RegisterWithActivationKeys",
                &(
                    org,
                    keys,
                    &options,
                    &connection_options,
                    self.locale.as_str(),
                ),
            )
            .map(drop)
        })
    }

    fn organizations(&self, username: &str, password: &str) -> Result<Vec<String>, RhsmError> {
        let connection_options: HashMap<String, String> = HashMap::new();
        self.with_register_server(|private| {
            let msg = call(
                private,
                REGISTER_PATH,
                REGISTER_IFACE,
                "GetOrgs",
                &(username, password, &connection_options, self.locale.as_str()),
            )?;
            parse_organizations(&reply_string(&msg)?)
        })
    }

    fn unregister(&self) -> Result<(), RhsmError> {
        let connection_options: HashMap<String, String> = HashMap::new();
        call(
            self.bus()?,
            UNREGISTER_PATH,
            UNREGISTER_IFACE,
            "Unregister",
            &(&connection_options, self.locale.as_str()),
        )
        .map(drop)
    }

    fn config_value(&self, key: &str) -> Result<String, RhsmError> {
        let msg = call(
            self.bus()?,
            CONFIG_PATH,
            CONFIG_IFACE,
            "Get",
            &(key, self.locale.as_str()),
        )?;
        let value: OwnedValue = msg
            .body()
            .deserialize()
            .map_err(|e| RhsmError::Malformed(e.to_string()))?;
        String::try_from(value).map_err(|e| RhsmError::Malformed(format!("{key}: {e}")))
    }

    fn set_config_value(&self, key: &str, value: &str) -> Result<(), RhsmError> {
        call(
            self.bus()?,
            CONFIG_PATH,
            CONFIG_IFACE,
            "Set",
            &(key, Value::from(value), self.locale.as_str()),
        )
        .map(drop)
    }
}
