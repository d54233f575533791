pub mod opcua_server;
